/// A normalized image in channel-major (`C × H × W`) layout.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageTensor {
    pub channels: usize,
    pub height: usize,
    pub width: usize,
    pub data: Vec<f64>,
}

impl ImageTensor {
    pub fn zeros(channels: usize, height: usize, width: usize) -> ImageTensor {
        ImageTensor { channels, height, width, data: vec![0.0; channels * height * width] }
    }

    pub fn shape(&self) -> (usize, usize, usize) {
        (self.channels, self.height, self.width)
    }

    #[inline]
    pub fn index(&self, c: usize, y: usize, x: usize) -> usize {
        (c * self.height + y) * self.width + x
    }

    pub fn get(&self, c: usize, y: usize, x: usize) -> f64 {
        self.data[self.index(c, y, x)]
    }

    /// Flattened input for the dense classifier.
    pub fn into_vec(self) -> Vec<f64> {
        self.data
    }
}
