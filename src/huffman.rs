//! Static Huffman coding over a fixed 256-symbol alphabet, used to code
//! zig-zag-mapped LPC coefficients. The trees are compiled in: every handle
//! shares the same two trees (raw coefficients, and sums of adjacent
//! coefficients), built once from a representative Laplacian-shaped
//! frequency table and memoized behind a `OnceLock`.

use crate::bitstream::{BitReader, BitWriter};
use crate::Result;

const MAX_NUM_SYMBOLS: usize = 256;
const NUM_NODES: usize = 2 * MAX_NUM_SYMBOLS;

#[derive(Clone, Copy)]
struct Node {
    node0: i32,
    node1: i32,
}

/// A built Huffman tree plus per-symbol codes, ready for encode/decode.
pub struct HuffmanTree {
    nodes: [Node; NUM_NODES],
    root_node: i32,
    codes: [(u32, u8); MAX_NUM_SYMBOLS],
}

impl HuffmanTree {
    /// Builds a tree from symbol frequencies, promoting zero counts to one so
    /// every symbol gets a code.
    pub fn build(counts: &[u32; MAX_NUM_SYMBOLS]) -> Self {
        let mut freq = [0u64; NUM_NODES + 1];
        for (i, &c) in counts.iter().enumerate() {
            freq[i] = if c == 0 { 1 } else { c as u64 };
        }
        let sentinel = NUM_NODES;
        freq[sentinel] = u64::MAX;

        let mut nodes = [Node { node0: -1, node1: -1 }; NUM_NODES];
        let mut alive: Vec<usize> = (0..MAX_NUM_SYMBOLS).collect();
        let mut free_node = MAX_NUM_SYMBOLS;
        let mut root_node = 0i32;

        loop {
            // Find the two lowest-frequency live nodes.
            let mut min1 = sentinel;
            let mut min2 = sentinel;
            for &n in &alive {
                if freq[n] < freq[min1] {
                    min2 = min1;
                    min1 = n;
                } else if freq[n] < freq[min2] {
                    min2 = n;
                }
            }
            if min2 == sentinel {
                root_node = min1 as i32;
                break;
            }
            let parent = free_node;
            free_node += 1;
            freq[parent] = freq[min1] + freq[min2];
            nodes[parent] = Node { node0: min1 as i32, node1: min2 as i32 };
            alive.retain(|&n| n != min1 && n != min2);
            alive.push(parent);
        }

        let mut codes = [(0u32, 0u8); MAX_NUM_SYMBOLS];
        convert_tree_to_codes(&nodes, root_node, 0, 0, &mut codes);

        Self { nodes, root_node, codes }
    }

    /// Writes `symbol`'s code to `writer`.
    pub fn put_code(&self, writer: &mut BitWriter, symbol: u8) {
        let (code, bits) = self.codes[symbol as usize];
        writer.put_bits(code, bits as u32);
    }

    /// Number of bits `symbol`'s code occupies, without writing anything.
    pub fn code_len(&self, symbol: u8) -> u32 {
        self.codes[symbol as usize].1 as u32
    }

    /// Reads one symbol from `reader` by walking the tree bit by bit.
    pub fn get_code(&self, reader: &mut BitReader) -> Result<u8> {
        let mut node = self.root_node;
        while node as usize >= MAX_NUM_SYMBOLS {
            let bit = reader.get_bits(1)?;
            let n = &self.nodes[node as usize];
            node = if bit == 0 { n.node0 } else { n.node1 };
        }
        Ok(node as u8)
    }
}

fn convert_tree_to_codes(
    nodes: &[Node; NUM_NODES],
    node: i32,
    code: u32,
    depth: u8,
    out: &mut [(u32, u8); MAX_NUM_SYMBOLS],
) {
    if (node as usize) < MAX_NUM_SYMBOLS {
        out[node as usize] = (code, depth.max(1));
        return;
    }
    let n = nodes[node as usize];
    convert_tree_to_codes(nodes, n.node0, code << 1, depth + 1, out);
    convert_tree_to_codes(nodes, n.node1, (code << 1) | 1, depth + 1, out);
}

/// Builds a Laplacian-shaped frequency table over the zig-zag-mapped 8-bit
/// coefficient alphabet, centred at zero (symbol 0).
fn laplacian_counts() -> [u32; MAX_NUM_SYMBOLS] {
    let mut counts = [0u32; MAX_NUM_SYMBOLS];
    for (sym, slot) in counts.iter_mut().enumerate() {
        // zig-zag symbol -> signed magnitude, then a geometric falloff.
        let signed = crate::utility::uint32_to_sint32(sym as u32);
        let magnitude = signed.unsigned_abs() as f64;
        let weight = (-magnitude / 12.0).exp();
        *slot = (1.0 + weight * 100_000.0) as u32;
    }
    counts
}

/// Returns the shared tree used to code raw LPC coefficients.
pub fn raw_coefficient_tree() -> &'static HuffmanTree {
    static TREE: std::sync::OnceLock<HuffmanTree> = std::sync::OnceLock::new();
    TREE.get_or_init(|| HuffmanTree::build(&laplacian_counts()))
}

/// Returns the shared tree used to code sums of adjacent LPC coefficients
/// (a flatter distribution than a single raw coefficient).
pub fn sum_coefficient_tree() -> &'static HuffmanTree {
    static TREE: std::sync::OnceLock<HuffmanTree> = std::sync::OnceLock::new();
    TREE.get_or_init(|| {
        let mut counts = laplacian_counts();
        for (sym, slot) in counts.iter_mut().enumerate() {
            let signed = crate::utility::uint32_to_sint32(sym as u32);
            let magnitude = signed.unsigned_abs() as f64;
            *slot = (1.0 + (-magnitude / 20.0).exp() * 100_000.0) as u32;
        }
        HuffmanTree::build(&counts)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_symbol_round_trips() {
        let tree = raw_coefficient_tree();
        let mut w = BitWriter::new();
        for sym in 0u8..=255 {
            tree.put_code(&mut w, sym);
        }
        let bytes = w.into_bytes();
        let mut r = BitReader::new(&bytes);
        for sym in 0u8..=255 {
            assert_eq!(tree.get_code(&mut r).unwrap(), sym);
        }
    }

    #[test]
    fn frequent_symbols_get_shorter_or_equal_codes_than_rare_ones() {
        let tree = raw_coefficient_tree();
        let (_, zero_bits) = tree.codes[0];
        let (_, rare_bits) = tree.codes[255];
        assert!(zero_bits <= rare_bits);
    }
}
