//! CSI/DCS parameter parsing
//!
//! Parameters are a list of groups separated by `;`; each group may carry
//! `:`-separated sub-parameters. `38;5;9` therefore parses to three groups
//! while `38:5:9` parses to one group with two sub-parameters, and the two
//! spellings stay distinguishable for SGR dispatch.

/// Maximum number of parameter groups tracked per sequence
const MAX_PARAMS: usize = 32;

/// Parsed parameter list
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Params {
    /// Each group is `[primary, sub1, sub2, ...]`; an absent value is 0
    groups: Vec<Vec<u16>>,
}

impl Params {
    /// Create empty params
    pub fn new() -> Self {
        Self { groups: Vec::new() }
    }

    /// Create params from primary values only (no sub-parameters)
    pub fn from_slice(values: &[u16]) -> Self {
        Self {
            groups: values.iter().map(|&v| vec![v]).collect(),
        }
    }

    /// Parse parameter bytes collected between the CSI/DCS introducer and
    /// the final byte
    pub fn parse(bytes: &[u8]) -> Self {
        let mut params = Self::new();
        if bytes.is_empty() {
            return params;
        }

        let mut group: Vec<u16> = Vec::new();
        let mut current: u16 = 0;

        for &byte in bytes {
            match byte {
                b'0'..=b'9' => {
                    current = current
                        .saturating_mul(10)
                        .saturating_add((byte - b'0') as u16);
                }
                b':' => {
                    group.push(current);
                    current = 0;
                }
                b';' => {
                    group.push(current);
                    if params.groups.len() < MAX_PARAMS {
                        params.groups.push(std::mem::take(&mut group));
                    } else {
                        group.clear();
                    }
                    current = 0;
                }
                _ => {
                    // Stray bytes (should have been routed elsewhere by the
                    // state machine) are ignored.
                }
            }
        }

        group.push(current);
        if params.groups.len() < MAX_PARAMS {
            params.groups.push(group);
        }

        params
    }

    /// Number of parameter groups
    pub fn len(&self) -> usize {
        self.groups.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Primary value at index, `None` if absent or 0 (= default)
    pub fn get(&self, index: usize) -> Option<u16> {
        self.raw(index).filter(|&v| v != 0)
    }

    /// Primary value at index with a default for absent/0
    pub fn get_or(&self, index: usize, default: u16) -> u16 {
        self.get(index).unwrap_or(default)
    }

    /// Primary value at index, `None` only if the group does not exist
    pub fn raw(&self, index: usize) -> Option<u16> {
        self.groups.get(index).map(|g| g[0])
    }

    /// Sub-parameters of the group at index (empty slice if none)
    pub fn subparams(&self, index: usize) -> &[u16] {
        self.groups
            .get(index)
            .map(|g| &g[1..])
            .unwrap_or(&[])
    }

    /// Whether the group at index carries `:` sub-parameters
    pub fn has_subparams(&self, index: usize) -> bool {
        !self.subparams(index).is_empty()
    }

    /// Iterate over primary values
    pub fn iter(&self) -> impl Iterator<Item = u16> + '_ {
        self.groups.iter().map(|g| g[0])
    }

    /// Iterate over `(primary, subparams)` pairs
    pub fn iter_groups(&self) -> impl Iterator<Item = (u16, &[u16])> + '_ {
        self.groups.iter().map(|g| (g[0], &g[1..]))
    }
}
