//! Initial stack frame of a new task
//!
//! A task that has never run is started by the same exception return that
//! resumes a preempted one, so its stack must look exactly like a saved
//! context. From the lowest address up:
//!
//! ```text
//!  sp ->  r4 r5 r6 r7 r8 r9 r10 r11   software-saved by PendSV
//!         EXC_RETURN                  thread mode, PSP, basic frame
//!         r0 r1 r2 r3 r12 lr pc xPSR  hardware-stacked on exception entry
//! ```
//!
//! The hardware part must start 8-byte aligned; `pc` carries the Thumb bit
//! and `xPSR` only the T bit.

use crate::config::CFG_STK_GUARD_WORDS;
use crate::error::{OsError, OsResult};
use crate::types::OsStkElement;

/// Words in the initial frame
pub const FRAME_WORDS: usize = 17;

/// Return to thread mode using the process stack, no FPU state
pub const EXC_RETURN_THREAD_PSP: u32 = 0xFFFF_FFFD;

/// xPSR with only the Thumb bit set
pub const XPSR_THUMB: u32 = 0x0100_0000;

/// Context a new task is started from
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InitialFrame {
    pub r4: u32,
    pub r5: u32,
    pub r6: u32,
    pub r7: u32,
    pub r8: u32,
    pub r9: u32,
    pub r10: u32,
    pub r11: u32,
    pub exc_return: u32,
    pub r0: u32,
    pub r1: u32,
    pub r2: u32,
    pub r3: u32,
    pub r12: u32,
    pub lr: u32,
    pub pc: u32,
    pub xpsr: u32,
}

impl InitialFrame {
    /// Frame that enters `entry` and lands in `exit` should it ever return
    pub const fn new(entry: u32, exit: u32) -> Self {
        InitialFrame {
            r4: 0x0404_0404,
            r5: 0x0505_0505,
            r6: 0x0606_0606,
            r7: 0x0707_0707,
            r8: 0x0808_0808,
            r9: 0x0909_0909,
            r10: 0x1010_1010,
            r11: 0x1111_1111,
            exc_return: EXC_RETURN_THREAD_PSP,
            r0: 0,
            r1: 0x0101_0101,
            r2: 0x0202_0202,
            r3: 0x0303_0303,
            r12: 0x1212_1212,
            lr: exit | 1,
            pc: entry | 1,
            xpsr: XPSR_THUMB,
        }
    }

    /// The frame in stack order
    pub const fn words(&self) -> [u32; FRAME_WORDS] {
        [
            self.r4,
            self.r5,
            self.r6,
            self.r7,
            self.r8,
            self.r9,
            self.r10,
            self.r11,
            self.exc_return,
            self.r0,
            self.r1,
            self.r2,
            self.r3,
            self.r12,
            self.lr,
            self.pc,
            self.xpsr,
        ]
    }

    /// Write the frame at the top of `stack`
    ///
    /// `stack` must start on an 8-byte boundary. Returns the index of the
    /// initial stack pointer within `stack`.
    pub fn write(&self, stack: &mut [OsStkElement]) -> OsResult<usize> {
        let top = stack.len() & !1;
        if top < FRAME_WORDS + CFG_STK_GUARD_WORDS + 1 {
            return Err(OsError::StkSizeInvalid);
        }

        let sp = top - FRAME_WORDS;
        stack[sp..top].copy_from_slice(&self.words());
        Ok(sp)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_layout() {
        assert_eq!(core::mem::size_of::<InitialFrame>(), FRAME_WORDS * 4);

        let frame = InitialFrame::new(0x0800_1234, 0x0800_2000);
        let words = frame.words();
        assert_eq!(words[8], EXC_RETURN_THREAD_PSP);
        assert_eq!(words[15], 0x0800_1235);
        assert_eq!(words[16], XPSR_THUMB);
    }

    #[test]
    fn test_write_aligned() {
        let mut stack = [0u32; 65];
        let sp = InitialFrame::new(0x100, 0x200).write(&mut stack).unwrap();

        assert_eq!(sp, 64 - FRAME_WORDS);
        // hardware frame starts on an even word
        assert_eq!((sp + 9) % 2, 0);
        assert_eq!(stack[63], XPSR_THUMB);
        assert_eq!(stack[64], 0);
    }

    #[test]
    fn test_write_too_small() {
        let mut stack = [0u32; FRAME_WORDS + 2];
        assert_eq!(
            InitialFrame::new(0, 0).write(&mut stack),
            Err(OsError::StkSizeInvalid)
        );
    }
}
