//! Identifiers for the card's profile application ("券面入力補助AP").

use crate::record::Manifest;

/// AID of the profile application DF.
pub const PROFILE_AP: [u8; 10] = [0xD3, 0x92, 0x10, 0x00, 0x31, 0x00, 0x01, 0x01, 0x04, 0x08];

/// EF of the profile application's PIN.
pub const PROFILE_PIN_EF: [u8; 2] = [0x00, 0x11];

/// EF of the basic four info.
pub const BASIC_FOUR_EF: [u8; 2] = [0x00, 0x02];

/// Where to find things on the card. The default is the national identity card; other
/// values are only useful against test cards or emulators.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Profile {
    pub application: Vec<u8>,
    pub pin_file: Vec<u8>,
    pub data_file: Vec<u8>,
    pub manifest: Manifest,
}

impl Default for Profile {
    fn default() -> Self {
        Self {
            application: PROFILE_AP.to_vec(),
            pin_file: PROFILE_PIN_EF.to_vec(),
            data_file: BASIC_FOUR_EF.to_vec(),
            manifest: Manifest::default(),
        }
    }
}
