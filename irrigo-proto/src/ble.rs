//! BLE GATT Service Constants for the Irrigation Controller
//!
//! The controller exposes one service with two characteristics: the client
//! writes JSON commands to the command characteristic and receives JSON
//! responses as notifications on the response characteristic.

/// Name the controller advertises
pub const DEVICE_NAME: &str = "Irrigation Controller";

/// BLE Service UUID: 4fafc201-1fb5-459e-8fcc-c5c9c331914b
pub const SERVICE_UUID: u128 = 0x4fafc201_1fb5_459e_8fcc_c5c9c331914b;

/// Command Characteristic UUID (write)
pub const COMMAND_UUID: u128 = 0xbeb5483e_36e1_4688_b7f5_ea07361b26a8;

/// Response Characteristic UUID (notify)
pub const RESPONSE_UUID: u128 = 0x1c95d5e3_d8f7_413a_bf3d_7a2e5d7be87e;
