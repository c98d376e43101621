use tonic_build::manual::{Builder, Method, Service};

const CODEC: &str = "tonic::codec::ProstCodec";

fn unary(name: &str, route: &str, input: &str, output: &str) -> Method {
    Method::builder()
        .name(name)
        .route_name(route)
        .input_type(format!("crate::messages::{input}"))
        .output_type(format!("crate::messages::{output}"))
        .codec_path(CODEC)
        .build()
}

fn main() {
    println!("cargo:rerun-if-changed=build.rs");

    let service = Service::builder()
        .name("Chord")
        .package("chord")
        .method(unary("health_check", "HealthCheck", "Empty", "HealthCheckResponse"))
        .method(unary("find_successor", "FindSuccessor", "Identifier", "NodeInfo"))
        .method(unary("get_successor", "GetSuccessor", "Empty", "NodeInfo"))
        .method(unary(
            "get_predecessor",
            "GetPredecessor",
            "Empty",
            "GetPredecessorResponse",
        ))
        .method(unary("set_predecessor", "SetPredecessor", "NodeInfo", "Empty"))
        .method(unary(
            "update_finger_table",
            "UpdateFingerTable",
            "UpdateFingerTableRequest",
            "Empty",
        ))
        .method(unary(
            "closest_preceding_finger",
            "ClosestPrecedingFinger",
            "Identifier",
            "NodeInfo",
        ))
        .method(unary("notify", "Notify", "NodeInfo", "Empty"))
        .build();

    Builder::new().compile(&[service]);
}
