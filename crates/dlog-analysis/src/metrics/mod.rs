//! Type metrics
//!
//! Summaries of a finished type analysis: how many clauses and terms were
//! typed, why the rest failed, and how many solver rounds clauses needed.

use dlog_core::dataflow::{ErrorCause, Verdict};
use dlog_core::TypeAnalysis;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypeReport {
    pub total_clauses: usize,
    pub valid_clauses: usize,
    pub invalid_clauses: usize,
    pub type_coverage: TypeCoverage,
    pub rounds: RoundsDistribution,
    pub clauses: Vec<ClauseSummary>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypeCoverage {
    pub total_terms: usize,
    pub typed_terms: usize,
    pub conflicting_terms: usize,
    pub unconstrained_terms: usize,
    pub coverage_percentage: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClauseSummary {
    pub index: usize,
    pub clause: String,
    pub valid: bool,
    pub rounds: usize,
    /// `label (term #n): cause` for every offending term
    pub errors: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoundsDistribution {
    pub trivial: usize, // rounds <= 1
    pub short: usize,   // 1 < rounds <= 3
    pub medium: usize,  // 3 < rounds <= 10
    pub long: usize,    // rounds > 10
}

impl Default for RoundsDistribution {
    fn default() -> Self {
        Self::new()
    }
}

impl RoundsDistribution {
    pub fn new() -> Self {
        Self {
            trivial: 0,
            short: 0,
            medium: 0,
            long: 0,
        }
    }

    pub fn add(&mut self, rounds: usize) {
        match rounds {
            0..=1 => self.trivial += 1,
            2..=3 => self.short += 1,
            4..=10 => self.medium += 1,
            _ => self.long += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.trivial + self.short + self.medium + self.long
    }
}

impl TypeReport {
    pub fn from_analysis(analysis: &TypeAnalysis) -> Self {
        let mut rounds = RoundsDistribution::new();
        let mut conflicting_terms = 0;
        let mut unconstrained_terms = 0;

        let clauses: Vec<ClauseSummary> = analysis
            .reports()
            .iter()
            .map(|report| {
                rounds.add(report.rounds);
                for error in report.verdict.errors() {
                    match error.cause {
                        ErrorCause::Conflict => conflicting_terms += 1,
                        ErrorCause::Unconstrained => unconstrained_terms += 1,
                    }
                }
                ClauseSummary {
                    index: report.index,
                    clause: report.clause_text.clone(),
                    valid: matches!(report.verdict, Verdict::Valid),
                    rounds: report.rounds,
                    errors: report.verdict.errors().iter().map(ToString::to_string).collect(),
                }
            })
            .collect();

        let total_terms = analysis.types().count();
        let typed_terms = analysis
            .types()
            .filter(|(term, _)| analysis.has_valid_type_info(*term))
            .count();
        let coverage_percentage = if total_terms > 0 {
            (typed_terms as f64 / total_terms as f64) * 100.0
        } else {
            100.0
        };
        let invalid_clauses = clauses.iter().filter(|c| !c.valid).count();

        TypeReport {
            total_clauses: clauses.len(),
            valid_clauses: clauses.len() - invalid_clauses,
            invalid_clauses,
            type_coverage: TypeCoverage {
                total_terms,
                typed_terms,
                conflicting_terms,
                unconstrained_terms,
                coverage_percentage,
            },
            rounds,
            clauses,
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dlog_core::ast::{Argument, Atom, Literal, Program, ProgramBuilder};
    use dlog_core::{TypeAnalysisConfig, TypeEnvironment};

    fn analysed(program: &Program) -> TypeAnalysis {
        let env = TypeEnvironment::from_program(program).unwrap();
        let mut analysis = TypeAnalysis::new(TypeAnalysisConfig::default());
        analysis.run(program, &env);
        analysis
    }

    #[test]
    fn test_empty_program() {
        let report = TypeReport::from_analysis(&analysed(&Program::default()));
        assert_eq!(report.total_clauses, 0);
        assert_eq!(report.type_coverage.total_terms, 0);
        assert_eq!(report.type_coverage.coverage_percentage, 100.0);
    }

    #[test]
    fn test_mixed_program() {
        let program = ProgramBuilder::new()
            .relation("A", &[("x", "number")])
            .clause(Atom::new("A", vec![Argument::number(1)]), vec![])
            .clause(
                Atom::new("E", vec![Argument::var("y")]),
                vec![Literal::atom("A", vec![Argument::var("x")])],
            )
            .build();
        let report = TypeReport::from_analysis(&analysed(&program));

        assert_eq!(report.total_clauses, 2);
        assert_eq!(report.valid_clauses, 1);
        assert_eq!(report.invalid_clauses, 1);
        assert_eq!(report.type_coverage.total_terms, 3);
        assert_eq!(report.type_coverage.typed_terms, 2);
        assert_eq!(report.type_coverage.unconstrained_terms, 1);
        assert_eq!(report.type_coverage.conflicting_terms, 0);
        assert_eq!(report.clauses[1].errors, vec!["y (term #1): unconstrained".to_string()]);
        assert_eq!(report.rounds.total(), 2);
    }

    #[test]
    fn test_rounds_distribution() {
        let mut dist = RoundsDistribution::new();

        dist.add(1); // trivial
        dist.add(3); // short
        dist.add(7); // medium
        dist.add(40); // long

        assert_eq!(dist.trivial, 1);
        assert_eq!(dist.short, 1);
        assert_eq!(dist.medium, 1);
        assert_eq!(dist.long, 1);
        assert_eq!(dist.total(), 4);
    }

    #[test]
    fn test_json_shape() {
        let program = ProgramBuilder::new()
            .relation("A", &[("x", "number")])
            .clause(Atom::new("A", vec![Argument::number(1)]), vec![])
            .build();
        let json = TypeReport::from_analysis(&analysed(&program)).to_json().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["valid_clauses"], 1);
        assert_eq!(value["clauses"][0]["clause"], "A(1).");
        assert_eq!(value["type_coverage"]["coverage_percentage"], 100.0);
    }
}
