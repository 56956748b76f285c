//! Routing vocabulary shared by the router, the orchestrator, and persistence.

use serde::{Deserialize, Serialize};

/// The classified category of a user message.
///
/// Controls both the answer strategy (canned vs. generated) and the
/// sub-domain framing of the generation prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scope {
    Welcome,
    Meta,
    OutOfScope,
    Sql,
    Dbt,
    Airflow,
    Bigquery,
}

impl Scope {
    pub fn as_str(&self) -> &'static str {
        match self {
            Scope::Welcome => "welcome",
            Scope::Meta => "meta",
            Scope::OutOfScope => "out_of_scope",
            Scope::Sql => "sql",
            Scope::Dbt => "dbt",
            Scope::Airflow => "airflow",
            Scope::Bigquery => "bigquery",
        }
    }

    /// Whether answering this scope invokes the generation backend.
    ///
    /// `welcome`, `meta` and `out_of_scope` are answered directly.
    pub fn requires_generation(&self) -> bool {
        matches!(
            self,
            Scope::Sql | Scope::Dbt | Scope::Airflow | Scope::Bigquery
        )
    }
}

impl std::fmt::Display for Scope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Scope {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "welcome" => Ok(Scope::Welcome),
            "meta" => Ok(Scope::Meta),
            "out_of_scope" => Ok(Scope::OutOfScope),
            "sql" => Ok(Scope::Sql),
            "dbt" => Ok(Scope::Dbt),
            "airflow" => Ok(Scope::Airflow),
            "bigquery" => Ok(Scope::Bigquery),
            other => Err(format!("unknown scope '{other}'")),
        }
    }
}

/// The router's verdict for one user message. Produced fresh per message
/// and never persisted as such.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoutingDecision {
    pub scope: Scope,

    /// Retrieved grounding text; empty when nothing was retrieved.
    pub context: String,

    /// Fixed answer for short-circuited scopes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub canned_answer: Option<String>,
}

impl RoutingDecision {
    pub fn new(scope: Scope, context: impl Into<String>) -> Self {
        Self {
            scope,
            context: context.into(),
            canned_answer: None,
        }
    }

    pub fn canned(scope: Scope, answer: impl Into<String>) -> Self {
        Self {
            scope,
            context: String::new(),
            canned_answer: Some(answer.into()),
        }
    }

    /// The answer returned without generation. Empty when no canned answer
    /// exists (e.g. `meta`, `out_of_scope`).
    pub fn direct_answer(&self) -> &str {
        self.canned_answer.as_deref().unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_domain_scopes_generate() {
        let generating: Vec<Scope> = [
            Scope::Welcome,
            Scope::Meta,
            Scope::OutOfScope,
            Scope::Sql,
            Scope::Dbt,
            Scope::Airflow,
            Scope::Bigquery,
        ]
        .into_iter()
        .filter(Scope::requires_generation)
        .collect();
        assert_eq!(
            generating,
            vec![Scope::Sql, Scope::Dbt, Scope::Airflow, Scope::Bigquery]
        );
    }

    #[test]
    fn scope_parses_its_own_display() {
        for s in [Scope::OutOfScope, Scope::Bigquery, Scope::Meta] {
            assert_eq!(s.to_string().parse::<Scope>().unwrap(), s);
        }
        assert!("warehouse".parse::<Scope>().is_err());
    }

    #[test]
    fn meta_direct_answer_is_empty() {
        let decision = RoutingDecision::new(Scope::Meta, "[Source: a]\ntext");
        assert_eq!(decision.direct_answer(), "");
    }
}
