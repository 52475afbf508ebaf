// Copyright (c) 2023 The Tapsign Authors

//! Prelude to simplify downstream use of APDU objects

pub use crate::{
    check_wallet::{CheckWalletReq, CheckWalletResp},
    command::CommandApdu,
    read::{CardStatus, ReadReq, ReadResp, SettingsMask},
    response::ResponseApdu,
    sign::{SignReq, SignResp, MAX_HASHES_PER_REQUEST, SIGNATURE_LEN},
    status::StatusCode,
    tlv::{Tag, Tlv, TlvList},
    ApduReq, ApduStatic, Curve, Instruction,
};
