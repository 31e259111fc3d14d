//! Model registry over the remote catalogue.
//!
//! The catalogue is a hub collection whose model ids follow
//! `<namespace>/quickmt-<src>-<tgt>`. Entries that do not match are
//! silently ignored. A failed refresh is logged and non-fatal: the
//! registry simply keeps (possibly empty) previous state.

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use parking_lot::{Mutex, RwLock};
use serde::Deserialize;
use tracing::{debug, info, warn};

use quickmt_core::LangPair;

/// Production catalogue endpoint.
pub const DEFAULT_COLLECTION_URL: &str =
    "https://huggingface.co/api/collections/quickmt/quickmt-models";

/// Successful catalogue responses are reused for this long.
const REFRESH_TTL: Duration = Duration::from_secs(3600);

/// One discovered model. Immutable after discovery.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ModelDescriptor {
    /// Full hub repo id, e.g. `quickmt/quickmt-fr-en`.
    pub id: String,
    /// Language pair parsed from the id.
    pub pair: LangPair,
}

/// Parse a catalogue model id of the form `<namespace>/quickmt-<src>-<tgt>`.
///
/// The parser is strict: anything else yields `None`.
pub fn parse_model_id(id: &str) -> Option<LangPair> {
    let name = id.rsplit('/').next()?;
    let rest = name.strip_prefix("quickmt-")?;
    let (src, tgt) = rest.split_once('-')?;
    let valid = |code: &str| code.len() == 2 && code.chars().all(|c| c.is_ascii_alphabetic());
    if valid(src) && valid(tgt) {
        Some(LangPair::new(src, tgt))
    } else {
        None
    }
}

#[derive(Debug, Deserialize)]
struct CollectionResponse {
    items: Vec<CollectionItem>,
}

#[derive(Debug, Deserialize)]
struct CollectionItem {
    item_id: String,
    #[serde(default)]
    item_type: String,
}

/// In-memory view of the remote catalogue.
pub struct Registry {
    http: reqwest::Client,
    collection_url: String,
    models: RwLock<Vec<ModelDescriptor>>,
    last_refresh: Mutex<Option<Instant>>,
}

impl Registry {
    /// Create a registry against a catalogue endpoint.
    pub fn new(collection_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            collection_url: collection_url.into(),
            models: RwLock::new(Vec::new()),
            last_refresh: Mutex::new(None),
        }
    }

    /// Create a registry with a fixed model list and no remote endpoint.
    ///
    /// Used by tests and embedders that know their models up front; the
    /// TTL is primed so `refresh` never reaches out.
    pub fn with_models(models: Vec<ModelDescriptor>) -> Self {
        let registry = Self::new(String::new());
        *registry.models.write() = models;
        *registry.last_refresh.lock() = Some(Instant::now());
        registry
    }

    /// Fetch the catalogue unless a successful fetch happened within the
    /// TTL. Errors are logged and swallowed.
    pub async fn refresh(&self) {
        {
            let last = self.last_refresh.lock();
            if let Some(at) = *last {
                if at.elapsed() < REFRESH_TTL {
                    debug!("catalogue refresh skipped (within TTL)");
                    return;
                }
            }
        }

        match self.fetch_catalogue().await {
            Ok(models) => {
                info!(models = models.len(), "discovered models from catalogue");
                *self.models.write() = models;
                *self.last_refresh.lock() = Some(Instant::now());
            }
            Err(e) => {
                warn!(error = %e, "catalogue refresh failed");
            }
        }
    }

    async fn fetch_catalogue(&self) -> Result<Vec<ModelDescriptor>, reqwest::Error> {
        let response: CollectionResponse = self
            .http
            .get(&self.collection_url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        Ok(response
            .items
            .into_iter()
            .filter(|item| item.item_type == "model")
            .filter_map(|item| {
                parse_model_id(&item.item_id).map(|pair| ModelDescriptor {
                    id: item.item_id,
                    pair,
                })
            })
            .collect())
    }

    /// Resolve a pair to its descriptor, if the catalogue has one.
    pub fn resolve(&self, src: &str, tgt: &str) -> Option<ModelDescriptor> {
        let pair = LangPair::new(src, tgt);
        self.models.read().iter().find(|m| m.pair == pair).cloned()
    }

    /// All discovered descriptors.
    pub fn models(&self) -> Vec<ModelDescriptor> {
        self.models.read().clone()
    }

    /// Source → sorted target languages, sorted by source.
    pub fn language_pairs(&self) -> BTreeMap<String, Vec<String>> {
        let mut pairs: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for m in self.models.read().iter() {
            let targets = pairs.entry(m.pair.src.clone()).or_default();
            if !targets.contains(&m.pair.tgt) {
                targets.push(m.pair.tgt.clone());
            }
        }
        for targets in pairs.values_mut() {
            targets.sort();
        }
        pairs
    }
}
