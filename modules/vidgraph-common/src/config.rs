use std::env;
use std::str::FromStr;

use tracing::info;

use crate::error::VidGraphError;

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    // Neo4j
    pub neo4j_uri: String,
    pub neo4j_user: String,
    pub neo4j_password: String,
    pub neo4j_database: Option<String>,

    // Ranking
    pub pagerank: PageRankConfig,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, VidGraphError> {
        Ok(Self {
            neo4j_uri: required_env("NEO4J_URI")?,
            neo4j_user: required_env("NEO4J_USER")?,
            neo4j_password: required_env("NEO4J_PASSWORD")?,
            neo4j_database: env::var("NEO4J_DATABASE").ok().filter(|s| !s.is_empty()),
            pagerank: PageRankConfig::from_env()?,
        })
    }

    /// Log the loaded configuration with secrets redacted.
    pub fn log_redacted(&self) {
        info!(
            neo4j_uri = self.neo4j_uri.as_str(),
            neo4j_user = self.neo4j_user.as_str(),
            neo4j_password = "[redacted]",
            neo4j_database = self.neo4j_database.as_deref().unwrap_or("<default>"),
            damping_factor = self.pagerank.damping_factor,
            epsilon = self.pagerank.epsilon,
            max_iterations = self.pagerank.max_iterations,
            "Loaded config"
        );
    }
}

/// Parameters for the PageRank power iteration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageRankConfig {
    pub damping_factor: f64,
    pub epsilon: f64,
    pub max_iterations: usize,
}

impl Default for PageRankConfig {
    fn default() -> Self {
        Self {
            damping_factor: 0.85,
            epsilon: 1e-6,
            max_iterations: 100,
        }
    }
}

impl PageRankConfig {
    /// Defaults overridden by `PAGERANK_DAMPING`, `PAGERANK_EPSILON`,
    /// `PAGERANK_MAX_ITERATIONS` when set.
    pub fn from_env() -> Result<Self, VidGraphError> {
        let defaults = Self::default();
        let config = Self {
            damping_factor: optional_env("PAGERANK_DAMPING")?.unwrap_or(defaults.damping_factor),
            epsilon: optional_env("PAGERANK_EPSILON")?.unwrap_or(defaults.epsilon),
            max_iterations: optional_env("PAGERANK_MAX_ITERATIONS")?
                .unwrap_or(defaults.max_iterations),
        };
        config
            .validate()
            .map_err(|e| VidGraphError::Config(e.to_string()))?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), VidGraphError> {
        if !(self.damping_factor > 0.0 && self.damping_factor < 1.0) {
            return Err(VidGraphError::invalid(format!(
                "damping factor must be in (0, 1), got {}",
                self.damping_factor
            )));
        }
        if !(self.epsilon > 0.0) {
            return Err(VidGraphError::invalid(format!(
                "epsilon must be positive, got {}",
                self.epsilon
            )));
        }
        if self.max_iterations == 0 {
            return Err(VidGraphError::invalid("max_iterations must be > 0"));
        }
        Ok(())
    }
}

fn required_env(key: &str) -> Result<String, VidGraphError> {
    env::var(key).map_err(|_| VidGraphError::Config(format!("{key} environment variable is required")))
}

fn optional_env<T: FromStr>(key: &str) -> Result<Option<T>, VidGraphError>
where
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|e| VidGraphError::Config(format!("{key}: {e}"))),
        _ => Ok(None),
    }
}
