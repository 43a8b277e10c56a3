//! GSM 05.03 channel coding and A5 ciphering used by the logical channel handlers

pub mod a5;
pub mod codec;
pub mod convenc;
pub mod crc;
pub mod interleaver;
pub mod viterbi;
