use crate::types::Rank;

/// Control messages exchanged between ranks of a mesh.
///
/// Element data does NOT flow through this enum. Collective and
/// point-to-point payloads travel on their own unidirectional streams with
/// a fixed binary header followed by raw bytes.
#[derive(rkyv::Archive, rkyv::Serialize, rkyv::Deserialize, Debug, Clone, PartialEq)]
pub enum ControlMessage {
    /// First stream on every mesh connection, sent by the lower rank.
    Hello {
        protocol_version: u16,
        rank: Rank,
        world_size: u32,
    },

    /// Sent to every peer during finalize once the sender has no more
    /// collective traffic outstanding.
    Goodbye { rank: Rank },
}
