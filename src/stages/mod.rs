pub mod stage0_extract;
pub mod stage1_diarize;
pub mod stage2_separate;
pub mod stage3_segment;
pub mod stage4_consensus;
pub mod stage5_chunk;
pub mod stage6_dub;
pub mod stage7_reassemble;
pub mod stage8_mux;

pub use stage0_extract::*;
pub use stage1_diarize::*;
pub use stage2_separate::*;
pub use stage3_segment::*;
pub use stage4_consensus::*;
pub use stage5_chunk::*;
pub use stage6_dub::*;
pub use stage7_reassemble::*;
pub use stage8_mux::*;
