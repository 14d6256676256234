use std::path::PathBuf;

use serde::Deserialize;

use crate::error::StrategyError;
use crate::topology::NodeRole;
use crate::{ContentId, NodeId};

/// A full simulation run: the network, the strategy under test, and the cache policy of every
/// cache node
#[derive(Debug, Clone, Deserialize)]
pub struct SimulationConfig {
    pub topology: TopologyConfig,
    pub strategy: StrategyConfig,
    #[serde(default)]
    pub cache_policy: ReplacementPolicyConfig,
    /// Seed of the single random stream shared by the randomised strategies
    #[serde(default)]
    pub seed: u64,
}

/// The network graph, with roles, cache budgets and content placement attached to the nodes
#[derive(Debug, Clone, Deserialize)]
pub struct TopologyConfig {
    pub nodes: Vec<NodeConfig>,
    pub edges: Vec<EdgeConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NodeConfig {
    pub id: NodeId,
    #[serde(default)]
    pub role: NodeRole,
    /// Number of contents the node can cache, 0 means the node has no cache
    #[serde(default)]
    pub cache_size: usize,
    /// Contents this node is the source of
    #[serde(default)]
    pub contents: Vec<ContentSpec>,
}

/// Either a single content id or an inclusive range of them
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ContentSpec {
    Single(ContentId),
    Range { from: ContentId, to: ContentId },
}

#[derive(Debug, Clone, Deserialize)]
pub struct EdgeConfig {
    pub u: NodeId,
    pub v: NodeId,
    #[serde(default = "default_delay")]
    pub delay: f64,
}

fn default_delay() -> f64 {
    1.0
}

/// The replacement policy of the node caches - fifo, lru, or lfu. Defaults to lru.
#[derive(Debug, Copy, Clone, Default, Deserialize, PartialEq, Eq)]
pub enum ReplacementPolicyConfig {
    #[serde(alias = "fifo", alias = "rr")]
    RoundRobin,
    #[default]
    #[serde(alias = "lru")]
    LeastRecentlyUsed,
    #[serde(alias = "lfu")]
    LeastFrequentlyUsed,
}

/// The strategy under test, selected by its registry name, with its tunables
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "name")]
pub enum StrategyConfig {
    #[serde(rename = "NO_CACHE")]
    NoCache,
    #[serde(rename = "EDGE")]
    Edge,
    #[serde(rename = "LCE")]
    LeaveCopyEverywhere,
    #[serde(rename = "LCD")]
    LeaveCopyDown,
    #[serde(rename = "PROB_CACHE")]
    ProbCache {
        #[serde(default = "default_t_tw")]
        t_tw: f64,
    },
    #[serde(rename = "CL4M")]
    CacheLessForMore {
        #[serde(default)]
        use_ego_betw: bool,
    },
    #[serde(rename = "RAND_CHOICE")]
    RandomChoice,
    #[serde(rename = "RAND_BERNOULLI")]
    RandomBernoulli {
        #[serde(default = "default_p")]
        p: f64,
    },
    #[serde(rename = "NRR")]
    NearestReplica { metacaching: String },
    #[serde(rename = "HR_SYMM")]
    HashroutingSymmetric,
    #[serde(rename = "HR_ASYMM")]
    HashroutingAsymmetric,
    #[serde(rename = "HR_MULTICAST")]
    HashroutingMulticast,
    #[serde(rename = "HR_HYBRID_AM")]
    HashroutingHybridAM {
        #[serde(default = "default_max_stretch")]
        max_stretch: f64,
    },
    #[serde(rename = "HR_HYBRID_SM")]
    HashroutingHybridSM,
    #[serde(rename = "OPTIMAL")]
    Optimal {
        /// Directory holding one `part<N>` sub-directory per snapshot
        snapshots: PathBuf,
        #[serde(default)]
        warmup_requests: u64,
        #[serde(default = "default_checkpoint_interval")]
        checkpoint_interval: u64,
        #[serde(default)]
        max_snapshots: Option<usize>,
    },
    #[serde(rename = "STATIC_OPTIMAL", alias = "OPTIMAL2")]
    StaticOptimal {
        placement: PathBuf,
        /// Maps placement indices to content ids; without it index `i` is content `i + 1`
        #[serde(default)]
        contents: Option<PathBuf>,
        #[serde(default)]
        warmup_requests: u64,
    },
    #[serde(rename = "HYBRID")]
    Hybrid {
        ranked_contents: PathBuf,
        #[serde(default = "default_static_fraction")]
        static_fraction: f64,
    },
    #[serde(rename = "CTR")]
    CharacteristicTime(CharacteristicTimeConfig),
    #[serde(rename = "CTR_LCE")]
    CharacteristicTimeLce(CharacteristicTimeConfig),
}

/// Tunables shared by both predictive strategies
#[derive(Debug, Clone, Deserialize)]
pub struct CharacteristicTimeConfig {
    /// Zipf exponent of the content popularity
    pub alpha: f64,
    /// Catalogue size the popularity distribution is truncated to
    pub n_contents: usize,
    #[serde(default = "default_table_capacity")]
    pub table_capacity: usize,
    /// Overrides the serving node's capacity in the residency model
    #[serde(default)]
    pub cache_size: Option<f64>,
    #[serde(default = "default_true")]
    pub symm_paths: bool,
}

fn default_t_tw() -> f64 {
    10.0
}

fn default_p() -> f64 {
    0.2
}

fn default_max_stretch() -> f64 {
    0.2
}

fn default_checkpoint_interval() -> u64 {
    100_000
}

fn default_static_fraction() -> f64 {
    100.0 / 101.0
}

fn default_table_capacity() -> usize {
    2
}

fn default_true() -> bool {
    true
}

/// All the names the registry knows, in the order they are documented
pub const STRATEGY_NAMES: [&str; 19] = [
    "NO_CACHE",
    "EDGE",
    "LCE",
    "LCD",
    "PROB_CACHE",
    "CL4M",
    "RAND_CHOICE",
    "RAND_BERNOULLI",
    "NRR",
    "HR_SYMM",
    "HR_ASYMM",
    "HR_MULTICAST",
    "HR_HYBRID_AM",
    "HR_HYBRID_SM",
    "OPTIMAL",
    "STATIC_OPTIMAL",
    "HYBRID",
    "CTR",
    "CTR_LCE",
];

impl StrategyConfig {
    /// Builds a configuration from a registry name and a JSON object of parameters
    ///
    /// # Examples
    ///
    /// ```
    /// use icnlib::config::StrategyConfig;
    /// let config = StrategyConfig::from_name("PROB_CACHE", serde_json::json!({"t_tw": 5.0})).unwrap();
    /// assert_eq!(config.name(), "PROB_CACHE");
    /// ```
    pub fn from_name(name: &str, params: serde_json::Value) -> Result<Self, StrategyError> {
        let canonical = if name == "OPTIMAL2" { "STATIC_OPTIMAL" } else { name };
        if !STRATEGY_NAMES.contains(&canonical) {
            return Err(StrategyError::UnknownStrategy(name.to_string()));
        }
        let mut object = match params {
            serde_json::Value::Object(map) => map,
            serde_json::Value::Null => serde_json::Map::new(),
            other => return Err(StrategyError::invalid("params", other, "must be a JSON object")),
        };
        object.insert("name".to_string(), serde_json::Value::String(canonical.to_string()));
        serde_json::from_value(serde_json::Value::Object(object))
            .map_err(|e| StrategyError::invalid("params", e, "does not match the strategy's parameters"))
    }

    /// The registry name of the configured strategy
    pub fn name(&self) -> &'static str {
        match self {
            StrategyConfig::NoCache => "NO_CACHE",
            StrategyConfig::Edge => "EDGE",
            StrategyConfig::LeaveCopyEverywhere => "LCE",
            StrategyConfig::LeaveCopyDown => "LCD",
            StrategyConfig::ProbCache { .. } => "PROB_CACHE",
            StrategyConfig::CacheLessForMore { .. } => "CL4M",
            StrategyConfig::RandomChoice => "RAND_CHOICE",
            StrategyConfig::RandomBernoulli { .. } => "RAND_BERNOULLI",
            StrategyConfig::NearestReplica { .. } => "NRR",
            StrategyConfig::HashroutingSymmetric => "HR_SYMM",
            StrategyConfig::HashroutingAsymmetric => "HR_ASYMM",
            StrategyConfig::HashroutingMulticast => "HR_MULTICAST",
            StrategyConfig::HashroutingHybridAM { .. } => "HR_HYBRID_AM",
            StrategyConfig::HashroutingHybridSM => "HR_HYBRID_SM",
            StrategyConfig::Optimal { .. } => "OPTIMAL",
            StrategyConfig::StaticOptimal { .. } => "STATIC_OPTIMAL",
            StrategyConfig::Hybrid { .. } => "HYBRID",
            StrategyConfig::CharacteristicTime(_) => "CTR",
            StrategyConfig::CharacteristicTimeLce(_) => "CTR_LCE",
        }
    }
}
