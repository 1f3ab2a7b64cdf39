// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! Identifies the role the local endpoint plays in the connection

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Type {
    /// The endpoint is a client
    Client,
    /// The endpoint is a server
    Server,
}

impl Type {
    /// Returns true if the given endpoint is a QUIC client
    #[inline]
    pub fn is_client(self) -> bool {
        self == Self::Client
    }

    /// Returns true if the given endpoint is a QUIC server
    #[inline]
    pub fn is_server(self) -> bool {
        self == Self::Server
    }
}
