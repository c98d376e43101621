//! Wire messages of the `chord.Chord` service.
//!
//! Identifiers travel as fixed-width big-endian unsigned integers
//! (`ceil(bits / 8)` bytes). Receivers also accept shorter encodings.

#[derive(Clone, Copy, PartialEq, ::prost::Message)]
pub struct Empty {}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Identifier {
    #[prost(bytes = "vec", tag = "1")]
    pub value: ::prost::alloc::vec::Vec<u8>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct NodeInfo {
    #[prost(bytes = "vec", tag = "1")]
    pub id: ::prost::alloc::vec::Vec<u8>,
    #[prost(string, tag = "2")]
    pub address: ::prost::alloc::string::String,
}

#[derive(Clone, Copy, PartialEq, ::prost::Message)]
pub struct HealthCheckResponse {
    #[prost(bool, tag = "1")]
    pub status: bool,
}

/// `node` is unset when the peer has no predecessor yet.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct GetPredecessorResponse {
    #[prost(message, optional, tag = "1")]
    pub node: ::core::option::Option<NodeInfo>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct UpdateFingerTableRequest {
    #[prost(message, optional, tag = "1")]
    pub node: ::core::option::Option<NodeInfo>,
    #[prost(uint32, tag = "2")]
    pub index: u32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use prost::Message;

    #[test]
    fn absent_predecessor_is_distinct_from_default_node() {
        let absent = GetPredecessorResponse { node: None };
        let present = GetPredecessorResponse {
            node: Some(NodeInfo::default()),
        };

        let absent = GetPredecessorResponse::decode(absent.encode_to_vec().as_slice()).unwrap();
        let present = GetPredecessorResponse::decode(present.encode_to_vec().as_slice()).unwrap();

        assert!(absent.node.is_none());
        assert_eq!(present.node, Some(NodeInfo::default()));
    }

    #[test]
    fn identifier_bytes_are_preserved_including_leading_zeros() {
        let id = Identifier {
            value: vec![0, 0, 0x12, 0x34],
        };
        let decoded = Identifier::decode(id.encode_to_vec().as_slice()).unwrap();
        assert_eq!(decoded.value, vec![0, 0, 0x12, 0x34]);
    }
}
