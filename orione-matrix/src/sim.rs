//! Simulated board for host-side testing
//!
//! [`SimBoard`] models a diode matrix: a column reads high when any closed
//! switch on it sits on a row that is currently driven high. Encoder lines
//! are plain levels, pulled up at rest. All pin handles share one state, so
//! a test can flip switches while the scanner owns the pins.

use std::convert::Infallible;
use std::sync::Arc;

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{ErrorType, InputPin, OutputPin};
use parking_lot::Mutex;

#[derive(Debug)]
struct BoardState {
    switches: Vec<Vec<bool>>,
    row_levels: Vec<bool>,
    clk: bool,
    dt: bool,
    sw: bool,
}

impl BoardState {
    fn column_level(&self, col: usize) -> bool {
        self.row_levels
            .iter()
            .zip(&self.switches)
            .any(|(&driven, row)| driven && row.get(col).copied().unwrap_or(false))
    }
}

/// Encoder line selector
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncoderLine {
    Clk,
    Dt,
    Sw,
}

/// Shared simulated board
#[derive(Debug, Clone)]
pub struct SimBoard {
    state: Arc<Mutex<BoardState>>,
}

impl SimBoard {
    pub fn new(rows: usize, cols: usize) -> Self {
        Self {
            state: Arc::new(Mutex::new(BoardState {
                switches: vec![vec![false; cols]; rows],
                row_levels: vec![false; rows],
                clk: true,
                dt: true,
                sw: true,
            })),
        }
    }

    /// Close or open the switch at `(row, col)`
    pub fn set_switch(&self, row: usize, col: usize, closed: bool) {
        self.state.lock().switches[row][col] = closed;
    }

    pub fn set_line(&self, line: EncoderLine, high: bool) {
        let mut state = self.state.lock();
        match line {
            EncoderLine::Clk => state.clk = high,
            EncoderLine::Dt => state.dt = high,
            EncoderLine::Sw => state.sw = high,
        }
    }

    /// Column input pins `0..N`
    pub fn columns<const N: usize>(&self) -> [SimColumn; N] {
        std::array::from_fn(|col| SimColumn {
            state: self.state.clone(),
            col,
        })
    }

    /// Row output pins `0..N`
    pub fn rows<const N: usize>(&self) -> [SimRow; N] {
        std::array::from_fn(|row| SimRow {
            state: self.state.clone(),
            row,
        })
    }

    pub fn encoder_line(&self, line: EncoderLine) -> SimLine {
        SimLine {
            state: self.state.clone(),
            line,
        }
    }
}

/// Column input
pub struct SimColumn {
    state: Arc<Mutex<BoardState>>,
    col: usize,
}

/// Row output
pub struct SimRow {
    state: Arc<Mutex<BoardState>>,
    row: usize,
}

/// Encoder input line
pub struct SimLine {
    state: Arc<Mutex<BoardState>>,
    line: EncoderLine,
}

/// Delay that returns immediately
pub struct SimDelay;

impl ErrorType for SimColumn {
    type Error = Infallible;
}

impl InputPin for SimColumn {
    fn is_high(&mut self) -> Result<bool, Self::Error> {
        Ok(self.state.lock().column_level(self.col))
    }

    fn is_low(&mut self) -> Result<bool, Self::Error> {
        self.is_high().map(|high| !high)
    }
}

impl ErrorType for SimRow {
    type Error = Infallible;
}

impl OutputPin for SimRow {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        self.state.lock().row_levels[self.row] = false;
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        self.state.lock().row_levels[self.row] = true;
        Ok(())
    }
}

impl ErrorType for SimLine {
    type Error = Infallible;
}

impl InputPin for SimLine {
    fn is_high(&mut self) -> Result<bool, Self::Error> {
        let state = self.state.lock();
        Ok(match self.line {
            EncoderLine::Clk => state.clk,
            EncoderLine::Dt => state.dt,
            EncoderLine::Sw => state.sw,
        })
    }

    fn is_low(&mut self) -> Result<bool, Self::Error> {
        self.is_high().map(|high| !high)
    }
}

impl DelayNs for SimDelay {
    fn delay_ns(&mut self, _ns: u32) {}
}
