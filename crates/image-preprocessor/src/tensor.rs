//! Preprocessed image tensor

use ndarray::{Array4, ArrayView4};

/// One preprocessed image in `[batch, channel, height, width]` layout.
///
/// Always stored contiguously in standard (row-major) order, so the flat
/// slice can be handed to a model runtime without another copy.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageTensor {
    data: Array4<f32>,
}

impl ImageTensor {
    /// Wrap an NCHW array, forcing standard layout
    pub fn from_array(data: Array4<f32>) -> Self {
        let data = if data.is_standard_layout() {
            data
        } else {
            data.as_standard_layout().into_owned()
        };
        Self { data }
    }

    /// Shape as `[n, c, h, w]`
    pub fn shape(&self) -> [usize; 4] {
        let (n, c, h, w) = self.data.dim();
        [n, c, h, w]
    }

    /// Borrow as an ndarray view
    pub fn view(&self) -> ArrayView4<'_, f32> {
        self.data.view()
    }

    /// Flat row-major elements
    pub fn as_slice(&self) -> &[f32] {
        self.data.as_slice().unwrap_or_default()
    }

    /// Consume into the flat row-major buffer
    pub fn into_vec(self) -> Vec<f32> {
        let (vec, _offset) = self.data.into_raw_vec_and_offset();
        vec
    }

    /// True when no element is NaN or infinite
    pub fn is_finite(&self) -> bool {
        self.data.iter().all(|v| v.is_finite())
    }
}
