// Copyright (c) 2023 The Tapsign Authors

//! Generic transport abstraction for physical card readers
//!
//! Platform NFC backends implement [Transport] for a single tag
//! connection, the [ReaderSession](crate::reader::ReaderSession)
//! owns it for the lifetime of one tap.

use std::sync::Arc;

use async_trait::async_trait;
use tapsign_apdu::DEFAULT_MAX_FRAME_LEN;

use crate::TransportError;

/// Raw frame exchange with an attached tag
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send a command frame and await the response frame
    async fn transceive(&self, req: &[u8]) -> Result<Vec<u8>, TransportError>;

    /// Maximum command frame length supported by the reader
    fn max_frame_len(&self) -> usize {
        DEFAULT_MAX_FRAME_LEN
    }
}

#[async_trait]
impl<T: Transport + ?Sized> Transport for Arc<T> {
    async fn transceive(&self, req: &[u8]) -> Result<Vec<u8>, TransportError> {
        T::transceive(self, req).await
    }

    fn max_frame_len(&self) -> usize {
        T::max_frame_len(self)
    }
}

#[async_trait]
impl<T: Transport + ?Sized> Transport for Box<T> {
    async fn transceive(&self, req: &[u8]) -> Result<Vec<u8>, TransportError> {
        T::transceive(self, req).await
    }

    fn max_frame_len(&self) -> usize {
        T::max_frame_len(self)
    }
}
