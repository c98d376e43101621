pub mod messages;

pub mod chord {
    pub use crate::messages::*;

    include!(concat!(env!("OUT_DIR"), "/chord.Chord.rs"));
}
