//! Sliding-window and line-buffer state machines shared by every spatial
//! operator.
//!
//! A stage never holds a whole feature map. It holds the current
//! kernel-sized receptive field (the *window*) plus per-row line rings with
//! the samples that left the window but are needed again for later output
//! rows. Together they always contain exactly the rows required for the
//! next output position, so buffered state is O(kernel × width × depth)
//! however tall the image is.
//!
//! Two protocols exist: the zero-padding variant used by the convolutions
//! (border zeros are synthesized on demand, never read) and the pooling
//! variant (no padding, exactly one fresh sample per column step). Hardware
//! shift registers become ring indices here; the consume/produce order and
//! the window contents are unchanged.

use rillnet_utils::Fixed;

use crate::stream::SampleSource;

/// Border condition flags for one [`PadWindow::shift`].
#[derive(Debug, Clone, Copy, Default)]
pub struct Borders {
    /// The shift following the first output column of a row.
    pub first_col: bool,
    /// The final re-priming shift of a row.
    pub last_col: bool,
    /// The window is entering the bottom padding region.
    pub last_row: bool,
}

/// Fixed-capacity ring of channel-vector slots.
struct Ring {
    data: Vec<Fixed>,
    depth: usize,
    cap: usize,
    head: usize,
    len: usize,
}

impl Ring {
    fn new(cap: usize, depth: usize) -> Ring {
        Ring {
            data: vec![Fixed::ZERO; cap * depth],
            depth,
            cap,
            head: 0,
            len: 0,
        }
    }

    fn pop_front_into(&mut self, dst: &mut [Fixed]) {
        debug_assert!(self.len > 0, "line buffer underrun");
        let base = self.head * self.depth;
        dst.copy_from_slice(&self.data[base..base + self.depth]);
        self.head = (self.head + 1) % self.cap;
        self.len -= 1;
    }

    fn push_back(&mut self, src: &[Fixed]) {
        debug_assert!(self.len < self.cap, "line buffer overrun");
        let pos = (self.head + self.len) % self.cap;
        let base = pos * self.depth;
        self.data[base..base + self.depth].copy_from_slice(src);
        self.len += 1;
    }

    fn clear(&mut self) {
        self.head = 0;
        self.len = 0;
    }

    fn state_len(&self) -> usize {
        self.data.len()
    }
}

/// Zero-padding window over a `size × size × depth` stream.
///
/// The window spans `kernel` padded rows; each row owns a line ring of
/// `size - kernel + 2` positions, one padded row's worth beyond the window.
pub struct PadWindow {
    kernel: usize,
    size: usize,
    depth: usize,
    /// `kernel × kernel × depth`, `[row][col][chn]`.
    window: Vec<Fixed>,
    rows: Vec<Ring>,
    evicted: Vec<Fixed>,
    fresh: Vec<Fixed>,
}

impl PadWindow {
    pub fn new(kernel: usize, size: usize, depth: usize) -> PadWindow {
        let ring_cap = size - kernel + 2;
        PadWindow {
            kernel,
            size,
            depth,
            window: vec![Fixed::ZERO; kernel * kernel * depth],
            rows: (0..kernel).map(|_| Ring::new(ring_cap, depth)).collect(),
            evicted: vec![Fixed::ZERO; (kernel - 1) * depth],
            fresh: vec![Fixed::ZERO; depth],
        }
    }

    /// The current receptive field, `[row][col][chn]` flattened.
    pub fn window(&self) -> &[Fixed] {
        &self.window
    }

    /// Total buffered state in samples, window plus line rings.
    pub fn state_samples(&self) -> usize {
        self.window.len() + self.rows.iter().map(Ring::state_len).sum::<usize>()
    }

    #[inline]
    fn win_index(&self, row: usize, col: usize) -> usize {
        (row * self.kernel + col) * self.depth
    }

    /// Prime the window and line rings for output position (0, 0).
    ///
    /// Consumes the first `kernel - 1` input rows plus intra-row lookahead;
    /// the top padding row and the left/right padding columns are
    /// synthesized without consuming input.
    pub fn fill<S: SampleSource>(&mut self, source: &mut S) {
        let (k, w, c) = (self.kernel, self.size, self.depth);
        for ring in &mut self.rows {
            ring.clear();
        }
        for row in 0..k {
            for col in 0..=w {
                for chn in 0..c {
                    self.fresh[chn] = if row == 0 || col == 0 {
                        Fixed::ZERO
                    } else {
                        source.next_sample()
                    };
                }
                if col < k {
                    let base = self.win_index(row, col);
                    self.window[base..base + c].copy_from_slice(&self.fresh);
                } else {
                    self.rows[row].push_back(&self.fresh);
                }
            }
            // Right padding column closes out the padded row.
            self.fresh.fill(Fixed::ZERO);
            self.rows[row].push_back(&self.fresh);
        }
    }

    /// Advance the window one column.
    ///
    /// The window slides left and each row refills from its line ring. The
    /// evicted left-column samples of rows 1.. re-enter rings 0..k-1, since
    /// the same padded column is revisited one output row later, one window
    /// row higher. The bottom ring takes one fresh stream sample, or a
    /// synthesized zero when a border flag applies.
    pub fn shift<S: SampleSource>(&mut self, source: &mut S, borders: Borders) {
        let (k, c) = (self.kernel, self.depth);
        for row in 1..k {
            let src = self.win_index(row, 0);
            let dst = (row - 1) * c;
            self.evicted[dst..dst + c].copy_from_slice(&self.window[src..src + c]);
        }
        for row in 0..k {
            let base = self.win_index(row, 0);
            self.window.copy_within(base + c..base + k * c, base);
            let last = self.win_index(row, k - 1);
            self.rows[row].pop_front_into(&mut self.window[last..last + c]);
        }
        for row in 0..k - 1 {
            let base = row * c;
            self.rows[row].push_back(&self.evicted[base..base + c]);
        }
        let pad = borders.last_row || borders.first_col || borders.last_col;
        for chn in 0..c {
            self.fresh[chn] = if pad { Fixed::ZERO } else { source.next_sample() };
        }
        self.rows[k - 1].push_back(&self.fresh);
    }

    /// Walk every output position in row-major order, exposing the window.
    ///
    /// Each output row takes `size` shifts plus `kernel - 1` re-priming
    /// shifts, since the kernel overlaps into the next row. Border flags
    /// follow the position: the bottom padding region begins once the
    /// window's lower edge passes the last input row.
    pub fn for_each_window<S, F>(mut self, source: &mut S, mut emit: F)
    where
        S: SampleSource,
        F: FnMut(&[Fixed]),
    {
        self.fill(source);
        let (k, w) = (self.kernel, self.size);
        for x in 0..w {
            let last_row = x + k > w;
            for y in 0..w {
                emit(&self.window);
                self.shift(
                    source,
                    Borders {
                        first_col: y == 0,
                        last_col: false,
                        last_row,
                    },
                );
            }
            for sec in 0..k - 1 {
                self.shift(
                    source,
                    Borders {
                        first_col: false,
                        last_col: sec == k - 2,
                        last_row,
                    },
                );
            }
        }
    }
}

/// No-padding window for the pooling stages.
///
/// Lookahead for the upper `pool - 1` rows lives in pop-only rings; the
/// bottom row streams directly. A fresh [`PoolWindow::fill`] begins each
/// pooling row block.
pub struct PoolWindow {
    pool: usize,
    size: usize,
    depth: usize,
    window: Vec<Fixed>,
    rows: Vec<Ring>,
    fresh: Vec<Fixed>,
}

impl PoolWindow {
    pub fn new(pool: usize, size: usize, depth: usize) -> PoolWindow {
        PoolWindow {
            pool,
            size,
            depth,
            window: vec![Fixed::ZERO; pool * pool * depth],
            rows: (0..pool - 1).map(|_| Ring::new(size - pool, depth)).collect(),
            fresh: vec![Fixed::ZERO; depth],
        }
    }

    /// The current pooling field, `[row][col][chn]` flattened.
    pub fn window(&self) -> &[Fixed] {
        &self.window
    }

    /// Total buffered state in samples, window plus line rings.
    pub fn state_samples(&self) -> usize {
        self.window.len() + self.rows.iter().map(Ring::state_len).sum::<usize>()
    }

    #[inline]
    fn win_index(&self, row: usize, col: usize) -> usize {
        (row * self.pool + col) * self.depth
    }

    /// Prime for the next row block: `pool - 1` full input rows plus the
    /// first `pool` samples of the block's bottom row.
    pub fn fill<S: SampleSource>(&mut self, source: &mut S) {
        let (p, w, c) = (self.pool, self.size, self.depth);
        for ring in &mut self.rows {
            ring.clear();
        }
        for row in 0..p - 1 {
            for col in 0..w {
                for chn in 0..c {
                    self.fresh[chn] = source.next_sample();
                }
                if col < p {
                    let base = self.win_index(row, col);
                    self.window[base..base + c].copy_from_slice(&self.fresh);
                } else {
                    self.rows[row].push_back(&self.fresh);
                }
            }
        }
        for col in 0..p {
            let base = self.win_index(p - 1, col);
            for chn in 0..c {
                self.window[base + chn] = source.next_sample();
            }
        }
    }

    /// Advance one column, consuming exactly one fresh bottom-row sample.
    pub fn shift<S: SampleSource>(&mut self, source: &mut S) {
        let (p, c) = (self.pool, self.depth);
        for row in 0..p {
            let base = self.win_index(row, 0);
            self.window.copy_within(base + c..base + p * c, base);
            let last = self.win_index(row, p - 1);
            if row < p - 1 {
                self.rows[row].pop_front_into(&mut self.window[last..last + c]);
            } else {
                for chn in 0..c {
                    self.window[last + chn] = source.next_sample();
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::IterSource;

    fn grid(size: usize) -> Vec<Fixed> {
        (0..size * size).map(|i| Fixed::from_int(i as i32 + 1)).collect()
    }

    /// Brute-force padded image for a single-channel square input.
    fn padded(input: &[Fixed], size: usize) -> Vec<Vec<Fixed>> {
        let mut out = vec![vec![Fixed::ZERO; size + 2]; size + 2];
        for r in 0..size {
            for c in 0..size {
                out[r + 1][c + 1] = input[r * size + c];
            }
        }
        out
    }

    #[test]
    fn padded_window_tracks_the_receptive_field() {
        let size = 4;
        let kernel = 3;
        let input = grid(size);
        let reference = padded(&input, size);

        let mut source = IterSource(input.clone().into_iter());
        let mut fields = Vec::new();
        PadWindow::new(kernel, size, 1).for_each_window(&mut source, |field| {
            fields.push(field.to_vec());
        });

        assert_eq!(fields.len(), size * size);
        for x in 0..size {
            for y in 0..size {
                let field = &fields[x * size + y];
                for r in 0..kernel {
                    for c in 0..kernel {
                        assert_eq!(
                            field[r * kernel + c],
                            reference[x + r][y + c],
                            "window mismatch at output ({x},{y}) offset ({r},{c})"
                        );
                    }
                }
            }
        }
        // Exactly size^2 samples consumed, none left over.
        assert!(source.0.next().is_none());
    }

    #[test]
    fn padded_window_keeps_channels_adjacent() {
        let size = 3;
        let depth = 2;
        let input: Vec<Fixed> = (0..size * size * depth)
            .map(|i| Fixed::from_int(i as i32))
            .collect();
        let mut source = IterSource(input.into_iter());
        let mut first = Vec::new();
        PadWindow::new(3, size, depth).for_each_window(&mut source, |field| {
            if first.is_empty() {
                first = field.to_vec();
            }
        });
        // Bottom-right of the first window is input pixel (1,1) = samples 8,9.
        let corner = (2 * 3 + 2) * depth;
        assert_eq!(first[corner], Fixed::from_int(8));
        assert_eq!(first[corner + 1], Fixed::from_int(9));
    }

    #[test]
    fn buffered_state_is_independent_of_height() {
        let window = PadWindow::new(3, 64, 8);
        assert_eq!(window.state_samples(), 3 * 3 * 8 + 3 * (64 - 3 + 2) * 8);

        let pool = PoolWindow::new(2, 64, 8);
        assert_eq!(pool.state_samples(), 2 * 2 * 8 + (64 - 2) * 8);
    }

    #[test]
    fn pool_window_advances_by_columns() {
        let size = 4;
        let input = grid(size);
        let mut source = IterSource(input.clone().into_iter());
        let mut win = PoolWindow::new(2, size, 1);
        win.fill(&mut source);
        // Columns 0..2 of rows 0..2.
        assert_eq!(
            win.window().to_vec(),
            vec![input[0], input[1], input[4], input[5]]
        );
        win.shift(&mut source);
        win.shift(&mut source);
        // Columns 2..4.
        assert_eq!(
            win.window().to_vec(),
            vec![input[2], input[3], input[6], input[7]]
        );
    }
}
