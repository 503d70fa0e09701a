//! Firmware core for Cypress EZ-USB AN21xx-class USB peripheral controllers.
//!
//! This crate implements the two protocol state machines of an EZ-USB
//! firmware that carry real correctness hazards, the interrupt-driven I2C
//! master driver and the USB control-endpoint setup dispatcher, plus the
//! cooperative command dispatch loop that ties them together.
//!
//! The chip's registers are reached through the capability traits
//! [`i2c::Instance`] and [`usb::Instance`] rather than a fixed register
//! layout. An integration for real silicon implements those traits over its
//! register block; the unit tests in this crate implement them over a
//! simulated device, so the state machines are verified on the host.
//!
//! # Usage
//!
//! ```ignore
//! use ezusb_fw::{commands::InfoCommands, dispatch::Device, i2c, usb};
//!
//! let i2c = i2c::I2c::new(board.i2c_regs(), i2c::Config::new());
//! let pipe = usb::ControlPipe::new(board.usb_regs(), &usb::descriptors::DESCRIPTORS);
//!
//! // Begin executing commands. This function never returns.
//! Device::new(pipe, i2c, InfoCommands::new()).run();
//! ```
#![cfg_attr(not(test), no_std)]
#![cfg_attr(docsrs, feature(doc_cfg))]

pub mod commands;
pub mod dispatch;
pub mod i2c;
pub mod prelude;
pub mod time;
pub mod usb;

#[cfg(test)]
mod mock;
