use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tally_refs::{branch_for_coin, validate_ref_name};
use tally_types::{ChainIdentity, Person};

use crate::error::{MinerError, MinerResult};
use crate::request::StaleAction;

pub const DEFAULT_DIFFICULTY: usize = 2;
pub const DEFAULT_LINK_LEVEL: usize = 3;
pub const DEFAULT_STAMP: &str = "TALLY";
pub const DEFAULT_BRANCH_TEMPLATE: &str = "coins/{coin}";
pub const DEFAULT_GENESIS_REF: &str = "refs/tags/genesis";

/// Which repository substrate a mirror uses.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// Tally's own object database and ref files.
    #[default]
    Native,
    /// A git repository driven through the `git` executable.
    Git,
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Native => "native",
            Self::Git => "git",
        })
    }
}

impl FromStr for Backend {
    type Err = MinerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "native" => Ok(Self::Native),
            "git" => Ok(Self::Git),
            other => Err(MinerError::Configuration(format!("unknown backend {other:?}"))),
        }
    }
}

/// Miner settings, loaded from TOML and then overridden from `TALLY_*`
/// environment variables.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MinerConfig {
    pub author_name: String,
    pub author_email: String,
    /// Defaults to the author.
    pub committer_name: Option<String>,
    pub committer_email: Option<String>,
    /// Leading hex characters a block hash must share with genesis.
    pub difficulty: usize,
    /// Ancestors referenced by every block.
    pub link_level: usize,
    /// Marker embedded in every mined message.
    pub stamp: String,
    /// Origin location: a bare directory for `native`, a git URL for `git`.
    pub origin: String,
    pub mirror_dir: PathBuf,
    pub coin: String,
    /// Branch name with a `{coin}` placeholder.
    pub branch_template: String,
    pub genesis_ref: String,
    pub backend: Backend,
    /// Give up on a request after this many candidate blocks.
    pub max_attempts: Option<u64>,
    /// Policy for caller commits that go stale.
    pub stale_action: StaleAction,
}

impl Default for MinerConfig {
    fn default() -> Self {
        Self {
            author_name: "Tally Miner".into(),
            author_email: "miner@tally.local".into(),
            committer_name: None,
            committer_email: None,
            difficulty: DEFAULT_DIFFICULTY,
            link_level: DEFAULT_LINK_LEVEL,
            stamp: DEFAULT_STAMP.into(),
            origin: String::new(),
            mirror_dir: PathBuf::from("mirror"),
            coin: "tally".into(),
            branch_template: DEFAULT_BRANCH_TEMPLATE.into(),
            genesis_ref: DEFAULT_GENESIS_REF.into(),
            backend: Backend::default(),
            max_attempts: None,
            stale_action: StaleAction::default(),
        }
    }
}

impl MinerConfig {
    pub fn from_toml_str(text: &str) -> MinerResult<Self> {
        toml::from_str(text).map_err(|e| MinerError::Configuration(e.to_string()))
    }

    pub fn to_toml_string(&self) -> MinerResult<String> {
        toml::to_string_pretty(self).map_err(|e| MinerError::Configuration(e.to_string()))
    }

    /// Load `path` if given (defaults otherwise), apply the process
    /// environment, and validate.
    pub fn load(path: Option<&Path>) -> MinerResult<Self> {
        let mut config = match path {
            Some(path) => {
                let text = std::fs::read_to_string(path).map_err(|e| {
                    MinerError::Configuration(format!("{}: {e}", path.display()))
                })?;
                Self::from_toml_str(&text)?
            }
            None => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Override fields from `TALLY_*` variables as returned by `lookup`.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) -> MinerResult<()> {
        let number = |key: &str, value: String| {
            value
                .trim()
                .parse::<u64>()
                .map_err(|_| MinerError::Configuration(format!("{key}: not a number: {value:?}")))
        };

        if let Some(v) = lookup("TALLY_AUTHOR_NAME") {
            self.author_name = v;
        }
        if let Some(v) = lookup("TALLY_AUTHOR_EMAIL") {
            self.author_email = v;
        }
        if let Some(v) = lookup("TALLY_COMMITTER_NAME") {
            self.committer_name = Some(v);
        }
        if let Some(v) = lookup("TALLY_COMMITTER_EMAIL") {
            self.committer_email = Some(v);
        }
        if let Some(v) = lookup("TALLY_DIFFICULTY") {
            self.difficulty = number("TALLY_DIFFICULTY", v)? as usize;
        }
        if let Some(v) = lookup("TALLY_LINK_LEVEL") {
            self.link_level = number("TALLY_LINK_LEVEL", v)? as usize;
        }
        if let Some(v) = lookup("TALLY_STAMP") {
            self.stamp = v;
        }
        if let Some(v) = lookup("TALLY_ORIGIN") {
            self.origin = v;
        }
        if let Some(v) = lookup("TALLY_MIRROR_DIR") {
            self.mirror_dir = PathBuf::from(v);
        }
        if let Some(v) = lookup("TALLY_COIN") {
            self.coin = v;
        }
        if let Some(v) = lookup("TALLY_BRANCH_TEMPLATE") {
            self.branch_template = v;
        }
        if let Some(v) = lookup("TALLY_GENESIS_REF") {
            self.genesis_ref = v;
        }
        if let Some(v) = lookup("TALLY_BACKEND") {
            self.backend = v.parse()?;
        }
        if let Some(v) = lookup("TALLY_MAX_ATTEMPTS") {
            self.max_attempts = Some(number("TALLY_MAX_ATTEMPTS", v)?);
        }
        if let Some(v) = lookup("TALLY_STALE_ACTION") {
            self.stale_action = v.parse()?;
        }
        Ok(())
    }

    pub fn validate(&self) -> MinerResult<()> {
        let invalid = |msg: String| -> MinerResult<()> { Err(MinerError::Configuration(msg)) };
        if self.difficulty == 0 {
            return invalid("difficulty must be at least 1".into());
        }
        if self.link_level == 0 {
            return invalid("link_level must be at least 1".into());
        }
        if self.stamp.trim().is_empty() {
            return invalid("stamp must not be empty".into());
        }
        if self.max_attempts == Some(0) {
            return invalid("max_attempts must be at least 1".into());
        }
        self.identity()
            .validate()
            .map_err(|e| MinerError::Configuration(e.to_string()))?;
        self.branch()?;
        validate_ref_name(&self.genesis_ref)
            .map_err(|e| MinerError::Configuration(e.to_string()))?;
        Ok(())
    }

    /// The identity every block is signed with.
    pub fn identity(&self) -> ChainIdentity {
        let author = Person::new(&self.author_name, &self.author_email);
        let committer = Person::new(
            self.committer_name.as_deref().unwrap_or(&self.author_name),
            self.committer_email.as_deref().unwrap_or(&self.author_email),
        );
        ChainIdentity::new(author, committer)
    }

    /// Short branch name for the configured coin.
    pub fn branch(&self) -> MinerResult<String> {
        branch_for_coin(&self.branch_template, &self.coin)
            .map_err(|e| MinerError::Configuration(e.to_string()))
    }

    pub fn branch_ref(&self) -> MinerResult<String> {
        Ok(format!("refs/heads/{}", self.branch()?))
    }
}
