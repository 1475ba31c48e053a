//! failure points `create` consults between chunk writes, so a test harness
//! can stop an operation halfway the way a killed process would.

/// decides whether the write of `chunk` (out of `chunks`) is never reached
pub trait FaultInjector {
    fn should_fail(&mut self, chunk: usize, chunks: usize) -> bool;
}

/// normal operation
#[derive(Debug, Default, Clone, Copy)]
pub struct NoFault;

impl FaultInjector for NoFault {
    fn should_fail(&mut self, _chunk: usize, _chunks: usize) -> bool {
        false
    }
}

/// stop right before the halfway chunk, `chunks / 2`
#[derive(Debug, Default, Clone, Copy)]
pub struct MidpointFault;

impl FaultInjector for MidpointFault {
    fn should_fail(&mut self, chunk: usize, chunks: usize) -> bool {
        chunk == chunks / 2
    }
}

/// stop right before a given chunk
#[derive(Debug, Clone, Copy)]
pub struct FailAtChunk(pub usize);

impl FaultInjector for FailAtChunk {
    fn should_fail(&mut self, chunk: usize, _chunks: usize) -> bool {
        chunk == self.0
    }
}
