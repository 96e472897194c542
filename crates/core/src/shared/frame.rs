use ndarray::{ArrayView3, ArrayViewMut3, ShapeError};

/// A single decoded video frame: contiguous RGB bytes in row-major order.
///
/// Format conversion happens at I/O boundaries only; the domain layer
/// treats pixel data as opaque. `pts` is the presentation timestamp in the
/// source stream's time base, carried through untouched to the sink.
#[derive(Clone, Debug)]
pub struct Frame {
    data: Vec<u8>,
    width: u32,
    height: u32,
    channels: u8,
    index: usize,
    pts: Option<i64>,
}

impl Frame {
    pub fn new(data: Vec<u8>, width: u32, height: u32, channels: u8, index: usize) -> Self {
        debug_assert_eq!(
            data.len(),
            (width as usize) * (height as usize) * (channels as usize),
            "data length must equal width * height * channels"
        );
        Self {
            data,
            width,
            height,
            channels,
            index,
            pts: None,
        }
    }

    pub fn with_pts(mut self, pts: Option<i64>) -> Self {
        self.pts = pts;
        self
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn channels(&self) -> u8 {
        self.channels
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn pts(&self) -> Option<i64> {
        self.pts
    }

    pub fn as_ndarray(&self) -> Result<ArrayView3<'_, u8>, ShapeError> {
        ArrayView3::from_shape(self.shape(), &self.data)
    }

    pub fn as_ndarray_mut(&mut self) -> Result<ArrayViewMut3<'_, u8>, ShapeError> {
        let shape = self.shape();
        ArrayViewMut3::from_shape(shape, &mut self.data)
    }

    fn shape(&self) -> (usize, usize, usize) {
        (
            self.height as usize,
            self.width as usize,
            self.channels as usize,
        )
    }
}
