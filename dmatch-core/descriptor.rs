use std::borrow::Cow;

use crate::error::{CoreError, CoreResult};
use crate::options::MetricFamily;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Row-major descriptor storage, one variant per metric family.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum DescriptorData {
    Binary(Vec<u8>),
    Continuous(Vec<f32>),
}

impl DescriptorData {
    fn len(&self) -> usize {
        match self {
            DescriptorData::Binary(d) => d.len(),
            DescriptorData::Continuous(d) => d.len(),
        }
    }
}

/// An ordered set of equally sized descriptors of a single family.
///
/// Row `i` is the descriptor of keypoint `i` in the parallel keypoint list.
/// Construction rejects ragged rows, zero-length rows and (for continuous
/// data) non-finite values, so every set handed to a matcher is rectangular
/// and totally ordered under its metric.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(try_from = "DescriptorSetRepr", into = "DescriptorSetRepr"))]
pub struct DescriptorSet {
    row_len: usize,
    data: DescriptorData,
}

impl DescriptorSet {
    /// Empty set of the given family. Matching against it fails with an empty-input error.
    pub fn empty(family: MetricFamily) -> Self {
        let data = match family {
            MetricFamily::Binary => DescriptorData::Binary(Vec::new()),
            MetricFamily::Continuous => DescriptorData::Continuous(Vec::new()),
        };
        Self { row_len: 0, data }
    }

    /// Build a binary set from bit-packed rows, e.g. `&[[u8; 32]]` ORB descriptors.
    pub fn binary_from_rows<R: AsRef<[u8]>>(rows: &[R]) -> CoreResult<Self> {
        let row_len = uniform_row_len(rows.iter().map(|r| r.as_ref().len()))?;
        let mut data = Vec::with_capacity(row_len * rows.len());
        for row in rows {
            data.extend_from_slice(row.as_ref());
        }
        Ok(Self { row_len, data: DescriptorData::Binary(data) })
    }

    /// Build a continuous set from rows of floats, e.g. SIFT vectors.
    pub fn continuous_from_rows<R: AsRef<[f32]>>(rows: &[R]) -> CoreResult<Self> {
        let row_len = uniform_row_len(rows.iter().map(|r| r.as_ref().len()))?;
        let mut data = Vec::with_capacity(row_len * rows.len());
        for row in rows {
            data.extend_from_slice(row.as_ref());
        }
        Self::continuous_from_flat(data, row_len)
    }

    /// Wrap an already row-major binary buffer.
    pub fn binary_from_flat(data: Vec<u8>, row_len: usize) -> CoreResult<Self> {
        check_flat(data.len(), row_len)?;
        let row_len = if data.is_empty() { 0 } else { row_len };
        Ok(Self { row_len, data: DescriptorData::Binary(data) })
    }

    /// Wrap an already row-major continuous buffer.
    pub fn continuous_from_flat(data: Vec<f32>, row_len: usize) -> CoreResult<Self> {
        check_flat(data.len(), row_len)?;
        if let Some(pos) = data.iter().position(|v| !v.is_finite()) {
            return Err(CoreError::NonFiniteValue {
                row: pos / row_len,
                column: pos % row_len,
            });
        }
        let row_len = if data.is_empty() { 0 } else { row_len };
        Ok(Self { row_len, data: DescriptorData::Continuous(data) })
    }

    pub fn family(&self) -> MetricFamily {
        match self.data {
            DescriptorData::Binary(_) => MetricFamily::Binary,
            DescriptorData::Continuous(_) => MetricFamily::Continuous,
        }
    }

    /// Number of descriptors (rows).
    pub fn len(&self) -> usize {
        if self.row_len == 0 { 0 } else { self.data.len() / self.row_len }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of elements per descriptor: bytes for binary sets, floats for continuous ones.
    pub fn row_len(&self) -> usize {
        self.row_len
    }

    pub fn data(&self) -> &DescriptorData {
        &self.data
    }

    /// Flat row-major bytes, if this is a binary set.
    pub fn as_binary(&self) -> Option<&[u8]> {
        match &self.data {
            DescriptorData::Binary(d) => Some(d.as_slice()),
            DescriptorData::Continuous(_) => None,
        }
    }

    /// Flat row-major floats, if this is a continuous set.
    pub fn as_continuous(&self) -> Option<&[f32]> {
        match &self.data {
            DescriptorData::Continuous(d) => Some(d.as_slice()),
            DescriptorData::Binary(_) => None,
        }
    }

    pub fn binary_row(&self, idx: usize) -> Option<&[u8]> {
        let range = self.row_range(idx)?;
        self.as_binary().map(|d| &d[range])
    }

    pub fn continuous_row(&self, idx: usize) -> Option<&[f32]> {
        let range = self.row_range(idx)?;
        self.as_continuous().map(|d| &d[range])
    }

    /// Widen to a continuous set: every byte becomes the `f32` of its value.
    ///
    /// The conversion is exact (`u8 → f32` is lossless); the bytes are never
    /// reinterpreted as float bit patterns. Continuous sets are returned as a copy.
    pub fn to_continuous(&self) -> DescriptorSet {
        DescriptorSet {
            row_len: self.row_len,
            data: DescriptorData::Continuous(self.widened_values().into_owned()),
        }
    }

    /// Row-major floats of this set, widening binary bytes the same way as
    /// [`DescriptorSet::to_continuous`]. Continuous data is borrowed as is.
    pub fn widened_values(&self) -> Cow<'_, [f32]> {
        match &self.data {
            DescriptorData::Binary(d) => Cow::Owned(d.iter().map(|&b| f32::from(b)).collect()),
            DescriptorData::Continuous(d) => Cow::Borrowed(d.as_slice()),
        }
    }

    fn row_range(&self, idx: usize) -> Option<std::ops::Range<usize>> {
        if idx >= self.len() {
            return None;
        }
        let start = idx * self.row_len;
        Some(start..start + self.row_len)
    }
}

fn uniform_row_len(mut lens: impl Iterator<Item = usize>) -> CoreResult<usize> {
    let Some(expected) = lens.next() else {
        return Ok(0);
    };
    if expected == 0 {
        return Err(CoreError::ZeroLengthRow);
    }
    for (i, actual) in lens.enumerate() {
        if actual != expected {
            return Err(CoreError::RaggedRow { row: i + 1, expected, actual });
        }
    }
    Ok(expected)
}

fn check_flat(len: usize, row_len: usize) -> CoreResult<()> {
    if len == 0 {
        return Ok(());
    }
    if row_len == 0 {
        return Err(CoreError::ZeroLengthRow);
    }
    if len % row_len != 0 {
        return Err(CoreError::BufferNotAligned { len, row_len });
    }
    Ok(())
}

/// Serialized form; validated on the way back in.
#[cfg(feature = "serde")]
#[derive(Serialize, Deserialize)]
struct DescriptorSetRepr {
    row_len: usize,
    data: DescriptorData,
}

#[cfg(feature = "serde")]
impl TryFrom<DescriptorSetRepr> for DescriptorSet {
    type Error = CoreError;

    fn try_from(repr: DescriptorSetRepr) -> CoreResult<Self> {
        match repr.data {
            DescriptorData::Binary(d) => Self::binary_from_flat(d, repr.row_len),
            DescriptorData::Continuous(d) => Self::continuous_from_flat(d, repr.row_len),
        }
    }
}

#[cfg(feature = "serde")]
impl From<DescriptorSet> for DescriptorSetRepr {
    fn from(set: DescriptorSet) -> Self {
        Self { row_len: set.row_len, data: set.data }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_binary_rows_are_flattened() {
        let set = DescriptorSet::binary_from_rows(&[[1u8, 2], [3, 4], [5, 6]]).unwrap();
        assert_eq!(set.family(), MetricFamily::Binary);
        assert_eq!(set.len(), 3);
        assert_eq!(set.row_len(), 2);
        assert_eq!(set.binary_row(1), Some(&[3u8, 4][..]));
        assert_eq!(set.binary_row(3), None);
        assert_eq!(set.continuous_row(0), None);
    }

    #[test]
    fn test_ragged_rows_rejected() {
        let rows: Vec<Vec<u8>> = vec![vec![1, 2, 3], vec![4, 5]];
        let result = DescriptorSet::binary_from_rows(&rows);
        assert_eq!(
            result,
            Err(CoreError::RaggedRow { row: 1, expected: 3, actual: 2 })
        );
    }

    #[test]
    fn test_zero_length_rows_rejected() {
        let rows: Vec<Vec<f32>> = vec![vec![], vec![]];
        assert_eq!(
            DescriptorSet::continuous_from_rows(&rows),
            Err(CoreError::ZeroLengthRow)
        );
    }

    #[test]
    fn test_flat_buffer_alignment() {
        let result = DescriptorSet::binary_from_flat(vec![0; 10], 4);
        assert!(matches!(result, Err(CoreError::BufferNotAligned { len: 10, row_len: 4 })));

        let set = DescriptorSet::binary_from_flat(vec![0; 12], 4).unwrap();
        assert_eq!(set.len(), 3);
    }

    #[test]
    fn test_non_finite_values_rejected() {
        let result = DescriptorSet::continuous_from_flat(vec![0.0, 1.0, f32::NAN, 2.0], 2);
        assert_eq!(result, Err(CoreError::NonFiniteValue { row: 1, column: 0 }));
    }

    #[test]
    fn test_empty_sets() {
        let rows: Vec<[u8; 32]> = Vec::new();
        let set = DescriptorSet::binary_from_rows(&rows).unwrap();
        assert!(set.is_empty());
        assert_eq!(set.family(), MetricFamily::Binary);

        let set = DescriptorSet::empty(MetricFamily::Continuous);
        assert!(set.is_empty());
        assert_eq!(set.family(), MetricFamily::Continuous);
    }

    #[test]
    fn test_widening_preserves_byte_values() {
        let set = DescriptorSet::binary_from_rows(&[[0u8, 255], [17, 128]]).unwrap();
        let wide = set.to_continuous();
        assert_eq!(wide.family(), MetricFamily::Continuous);
        assert_eq!(wide.len(), 2);
        assert_eq!(wide.row_len(), 2);
        assert_eq!(wide.continuous_row(0), Some(&[0.0f32, 255.0][..]));
        assert_eq!(wide.continuous_row(1), Some(&[17.0f32, 128.0][..]));
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_deserialization_revalidates() {
        let json = r#"{"row_len":3,"data":{"binary":[1,2,3,4]}}"#;
        let result: Result<DescriptorSet, _> = serde_json::from_str(json);
        assert!(result.is_err());

        let json = r#"{"row_len":2,"data":{"binary":[1,2,3,4]}}"#;
        let set: DescriptorSet = serde_json::from_str(json).unwrap();
        assert_eq!(set.len(), 2);
    }
}
