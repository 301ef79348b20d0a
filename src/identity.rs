//! Structural identities for stack frames.
//!
//! Debug adapters hand out frame ids that are only valid until execution resumes, so they can't
//! be used to recognize "the same frame" across stops. Instead a frame is identified by its
//! distance from the outermost caller and its name.

use rustc_hash::{FxHashMap, FxHashSet};
use serde::{Deserialize, Serialize};
use std::fmt::{self, Display};

/// Order in which a collector reports the frames of a stack.
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum FrameOrder {
    /// Index 0 is the currently executing frame. This is what `stackTrace` returns.
    #[default]
    InnermostFirst,
    /// Index 0 is the outermost caller.
    OutermostFirst,
}

#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct FrameIdentity {
    /// Position counted from the outermost caller, which is always at depth 0.
    pub depth: usize,
    pub name: String,
}

impl FrameIdentity {
    pub fn new(depth: usize, name: impl Into<String>) -> Self {
        Self {
            depth,
            name: name.into(),
        }
    }

    pub fn token(&self) -> FrameToken {
        FrameToken(format!("{}:{}", self.depth, self.name))
    }
}

impl Display for FrameIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (depth {})", self.name, self.depth)
    }
}

/// The key under which a frame's variables are stored.
///
/// The depth only consists of digits, so everything after the first `:` is the name and two
/// tokens are equal exactly when their identities are.
#[derive(Clone, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
#[serde(transparent)]
pub struct FrameToken(String);

impl FrameToken {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for FrameToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Assigns depths to frame names reported in `order` and resolves duplicates.
///
/// The result has the same order as `names`.
pub fn compute_identities<S: AsRef<str>>(names: &[S], order: FrameOrder) -> Vec<FrameIdentity> {
    let count = names.len();
    let identities = names
        .iter()
        .enumerate()
        .map(|(index, name)| {
            let depth = match order {
                FrameOrder::InnermostFirst => count - 1 - index,
                FrameOrder::OutermostFirst => index,
            };
            FrameIdentity::new(depth, name.as_ref())
        })
        .collect();
    disambiguate(identities)
}

/// Makes the tokens of one snapshot unique.
///
/// The first frame with a given depth and name keeps its name. Every later duplicate is renamed
/// to `name#k`, using the smallest `k` whose token is neither an original token of this snapshot
/// nor already taken by an earlier frame. The outcome only depends on the input order.
pub fn disambiguate(identities: Vec<FrameIdentity>) -> Vec<FrameIdentity> {
    let originals: FxHashSet<FrameToken> = identities.iter().map(FrameIdentity::token).collect();
    if originals.len() == identities.len() {
        return identities;
    }

    let mut taken = FxHashSet::default();
    let mut next_suffix: FxHashMap<FrameToken, usize> = FxHashMap::default();
    identities
        .into_iter()
        .map(|identity| {
            let token = identity.token();
            if taken.insert(token.clone()) {
                return identity;
            }

            let suffix = next_suffix.entry(token).or_insert(1);
            loop {
                let candidate =
                    FrameIdentity::new(identity.depth, format!("{}#{}", identity.name, suffix));
                *suffix += 1;
                let candidate_token = candidate.token();
                if !originals.contains(&candidate_token) && taken.insert(candidate_token) {
                    tracing::debug!("Renamed duplicate frame {identity} to {}", candidate.name);
                    return candidate;
                }
            }
        })
        .collect()
}
