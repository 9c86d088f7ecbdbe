mod frame;
mod message;

pub use frame::{decode_all, encode_frame, read_message, write_message, FrameError, FrameResult, DEFAULT_MAX_FRAME_BYTES};
pub use message::{
    ChainTxs, CircMessage, Decided, L2Block, L2BlockRequest, Message, Payload, RequestSeal,
    RollBackAndStartSlot, StartSc, StartSlot, Vote, XtRequest,
};
