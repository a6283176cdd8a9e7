use std::fmt;
use std::str::FromStr;

/// Messages up to this size go over the tree; larger ones over the ring.
pub const TREE_MAX_BYTES: usize = 256 * 1024;

/// Algorithm selector exposed to callers. The library always decides.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum VendorAlgorithm {
    #[default]
    Automatic,
}

impl VendorAlgorithm {
    pub const ALL: [VendorAlgorithm; 1] = [VendorAlgorithm::Automatic];

    pub const fn name(self) -> &'static str {
        match self {
            VendorAlgorithm::Automatic => "automatic",
        }
    }
}

impl fmt::Display for VendorAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for VendorAlgorithm {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|a| a.name() == s)
            .ok_or_else(|| format!("unknown vendor algorithm '{s}'"))
    }
}

/// How a reduction actually moves data across the fabric.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Protocol {
    /// Binomial-tree reduce to rank 0, then binomial broadcast.
    Tree,
    /// Ring reduce-scatter, then ring allgather.
    Ring,
}

impl Protocol {
    /// Protocol the library runs for a message of `bytes` over `world` ranks.
    pub fn select(bytes: usize, world: usize) -> Self {
        if world <= 2 || bytes <= TREE_MAX_BYTES {
            Protocol::Tree
        } else {
            Protocol::Ring
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Protocol::Tree => f.write_str("tree"),
            Protocol::Ring => f.write_str("ring"),
        }
    }
}
