// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! The slice of the peer's transport parameters the send path reacts to

use crate::varint::VarInt;

//= https://www.rfc-editor.org/rfc/rfc9000#section-18.2
//# max_udp_payload_size (0x03):  The maximum UDP payload size parameter is
//#    an integer value that limits the size of UDP payloads that the
//#    endpoint is willing to receive.  UDP datagrams with payloads larger
//#    than this limit are not likely to be processed by the receiving
//#    endpoint.

/// Transport parameters advertised by the peer.
///
/// The handshake layer owns the full parameter set; the packer is only
/// handed the fields that affect packet assembly.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TransportParameters {
    /// The largest UDP payload the peer is willing to receive
    pub max_udp_payload_size: Option<VarInt>,
}
