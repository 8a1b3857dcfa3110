// Copyright (c) 2021 James O. D. Hunt.
//
// SPDX-License-Identifier: Apache-2.0
//

//! Helpers shared by the unit tests.

use std::io::Write;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::scanner::Sink;

pub(crate) fn args(values: &[&str]) -> Vec<String> {
    values.iter().map(|v| v.to_string()).collect()
}

// Used to capture diagnostics.
#[derive(Clone, Debug, Default)]
pub(crate) struct BufWriter(Arc<Mutex<Vec<u8>>>);

impl Write for BufWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().write(buf)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.0.lock().flush()
    }
}

impl BufWriter {
    pub(crate) fn new() -> Self {
        BufWriter::default()
    }

    /// A diagnostic sink writing into this buffer.
    pub(crate) fn sink(&self) -> Sink {
        Arc::new(Mutex::new(self.clone()))
    }
}

impl ToString for BufWriter {
    fn to_string(&self) -> String {
        let output = self.0.lock();

        String::from_utf8_lossy(&output).into_owned()
    }
}
