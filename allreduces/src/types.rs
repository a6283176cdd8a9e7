use std::fmt;
use std::str::FromStr;

/// Rank of a participant in a communicator (0-indexed).
pub type Rank = u32;

/// Current wire protocol version, exchanged in the mesh handshake.
pub const PROTOCOL_VERSION: u16 = 1;

/// Element types a collective can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum DataType {
    F32 = 0,
    F64 = 1,
    I32 = 2,
    I64 = 3,
    U32 = 4,
    U64 = 5,
}

impl DataType {
    /// Size of one element in bytes.
    pub const fn size_in_bytes(self) -> usize {
        match self {
            DataType::F32 | DataType::I32 | DataType::U32 => 4,
            DataType::F64 | DataType::I64 | DataType::U64 => 8,
        }
    }

    /// Human-readable name.
    pub const fn name(self) -> &'static str {
        match self {
            DataType::F32 => "f32",
            DataType::F64 => "f64",
            DataType::I32 => "i32",
            DataType::I64 => "i64",
            DataType::U32 => "u32",
            DataType::U64 => "u64",
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Reduction operations for collective communication.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReduceOp {
    /// Element-wise sum across ranks.
    Sum,
    /// Element-wise product across ranks.
    Prod,
    /// Element-wise minimum across ranks.
    Min,
    /// Element-wise maximum across ranks.
    Max,
}

impl fmt::Display for ReduceOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReduceOp::Sum => f.write_str("sum"),
            ReduceOp::Prod => f.write_str("prod"),
            ReduceOp::Min => f.write_str("min"),
            ReduceOp::Max => f.write_str("max"),
        }
    }
}

mod sealed {
    pub trait Sealed {}
}

/// A plain numeric value that can travel through a collective.
///
/// Implemented for `f32`, `f64`, `i32`, `i64`, `u32` and `u64`. Values go on
/// the wire as their native (little-endian) byte representation via
/// `bytemuck`, so a buffer of any element type can be viewed as bytes
/// without copying.
pub trait Element:
    bytemuck::Pod + PartialEq + fmt::Debug + Send + Sync + 'static + sealed::Sealed
{
    /// Runtime tag for this element type.
    const DTYPE: DataType;

    /// Apply `op` to two values. Integers wrap on overflow.
    fn combine(a: Self, b: Self, op: ReduceOp) -> Self;
}

macro_rules! impl_element {
    (int: $($ty:ty => $dt:ident),*) => {
        $(
            impl sealed::Sealed for $ty {}
            impl Element for $ty {
                const DTYPE: DataType = DataType::$dt;

                #[inline]
                fn combine(a: Self, b: Self, op: ReduceOp) -> Self {
                    match op {
                        ReduceOp::Sum => a.wrapping_add(b),
                        ReduceOp::Prod => a.wrapping_mul(b),
                        ReduceOp::Min => a.min(b),
                        ReduceOp::Max => a.max(b),
                    }
                }
            }
        )*
    };
    (float: $($ty:ty => $dt:ident),*) => {
        $(
            impl sealed::Sealed for $ty {}
            impl Element for $ty {
                const DTYPE: DataType = DataType::$dt;

                #[inline]
                fn combine(a: Self, b: Self, op: ReduceOp) -> Self {
                    match op {
                        ReduceOp::Sum => a + b,
                        ReduceOp::Prod => a * b,
                        ReduceOp::Min => a.min(b),
                        ReduceOp::Max => a.max(b),
                    }
                }
            }
        )*
    };
}

impl_element!(int: i32 => I32, i64 => I64, u32 => U32, u64 => U64);
impl_element!(float: f32 => F32, f64 => F64);

/// Which allreduce algorithm a call should run.
///
/// Every algorithm produces the same mathematical result; the choice only
/// affects message count and volume. `Automatic` is resolved per call from
/// the message size and world size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum AllreduceAlgorithm {
    #[default]
    Automatic,
    /// Full exchange followed by a rank-ordered fold.
    Passthrough,
    RecursiveDoubling,
    Ring,
    /// Recursive-halving reduce-scatter plus recursive-doubling allgather.
    Rabenseifner,
    /// Pairwise-exchange reduce-scatter plus ring allgather.
    PeRing,
}

impl AllreduceAlgorithm {
    pub const ALL: [AllreduceAlgorithm; 6] = [
        AllreduceAlgorithm::Automatic,
        AllreduceAlgorithm::Passthrough,
        AllreduceAlgorithm::RecursiveDoubling,
        AllreduceAlgorithm::Ring,
        AllreduceAlgorithm::Rabenseifner,
        AllreduceAlgorithm::PeRing,
    ];

    pub const fn name(self) -> &'static str {
        match self {
            AllreduceAlgorithm::Automatic => "automatic",
            AllreduceAlgorithm::Passthrough => "passthrough",
            AllreduceAlgorithm::RecursiveDoubling => "recursive_doubling",
            AllreduceAlgorithm::Ring => "ring",
            AllreduceAlgorithm::Rabenseifner => "rabenseifner",
            AllreduceAlgorithm::PeRing => "pe_ring",
        }
    }
}

impl fmt::Display for AllreduceAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for AllreduceAlgorithm {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|a| a.name() == s)
            .ok_or_else(|| format!("unknown allreduce algorithm '{s}'"))
    }
}
