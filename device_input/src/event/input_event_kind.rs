// Copyright (c) 2025 R3BL LLC. Licensed under Apache License, Version 2.0.

// cspell:words EV_SYN EV_KEY EV_REL EV_ABS EV_MSC EV_SW EV_LED EV_SND EV_REP EV_FF EV_PWR

/// The `type` field of a record (`EV_*` in `linux/input-event-codes.h`).
///
/// Only the kinds listed here are delivered. Any other raw value, including the
/// bookkeeping values [`Self::MAX_RAW`] and [`Self::COUNT`], is dropped by the parser.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, strum_macros::Display, strum_macros::EnumIter,
)]
#[repr(u16)]
pub enum InputEventKind {
    /// `EV_SYN`, separates groups of events that happened at the same moment.
    Synchronization = 0x00,
    /// `EV_KEY`, keys and buttons.
    KeyStateChange = 0x01,
    /// `EV_REL`, e.g. mouse movement.
    RelativeAxis = 0x02,
    /// `EV_ABS`, e.g. touch screen coordinates.
    AbsoluteAxis = 0x03,
    /// `EV_MSC`, e.g. raw scan codes.
    Miscellaneous = 0x04,
    /// `EV_SW`, e.g. lid switch.
    BinarySwitch = 0x05,
    /// `EV_LED`
    Led = 0x11,
    /// `EV_SND`
    Sound = 0x12,
    /// `EV_REP`
    AutoRepeat = 0x14,
    /// `EV_FF`
    ForceFeedback = 0x15,
    /// `EV_PWR`
    Power = 0x16,
    /// `EV_FF_STATUS`
    ForceFeedbackStatus = 0x17,
}

impl InputEventKind {
    /// `EV_MAX`. Not a kind that ever appears on the wire.
    pub const MAX_RAW: u16 = 0x1f;
    /// `EV_CNT`. Not a kind that ever appears on the wire.
    pub const COUNT: u16 = Self::MAX_RAW + 1;

    #[must_use]
    pub fn from_raw(raw: u16) -> Option<Self> {
        Some(match raw {
            0x00 => Self::Synchronization,
            0x01 => Self::KeyStateChange,
            0x02 => Self::RelativeAxis,
            0x03 => Self::AbsoluteAxis,
            0x04 => Self::Miscellaneous,
            0x05 => Self::BinarySwitch,
            0x11 => Self::Led,
            0x12 => Self::Sound,
            0x14 => Self::AutoRepeat,
            0x15 => Self::ForceFeedback,
            0x16 => Self::Power,
            0x17 => Self::ForceFeedbackStatus,
            _ => return None,
        })
    }

    #[must_use]
    pub fn as_raw(self) -> u16 { self as u16 }
}
