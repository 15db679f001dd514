//! 4x4 column-major transform restricted to 2D affine use. Index 12 and 13
//! hold the translation, matching the shader's `mat4x4<f32>` layout.

const IDENTITY: [f32; 16] = [
    1.0, 0.0, 0.0, 0.0, //
    0.0, 1.0, 0.0, 0.0, //
    0.0, 0.0, 1.0, 0.0, //
    0.0, 0.0, 0.0, 1.0, //
];

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Matrix {
    pub values: [f32; 16],
}

impl Default for Matrix {
    fn default() -> Self {
        Self::identity()
    }
}

impl Matrix {
    pub const fn identity() -> Self {
        Self { values: IDENTITY }
    }

    pub fn set_identity(&mut self) {
        self.values = IDENTITY;
    }

    pub fn copy_from(&mut self, other: &Matrix) {
        self.values = other.values;
    }

    /// Post-multiplies by a rotation of `degrees`.
    pub fn rotate(&mut self, degrees: f32) {
        let (sin, cos) = degrees.to_radians().sin_cos();
        let v = &mut self.values;
        let (m0, m1, m4, m5) = (v[0], v[1], v[4], v[5]);
        v[0] = m0 * cos + m4 * sin;
        v[1] = m1 * cos + m5 * sin;
        v[4] = -m0 * sin + m4 * cos;
        v[5] = -m1 * sin + m5 * cos;
    }

    pub fn skew_x(&mut self, degrees: f32) {
        let tan = degrees.to_radians().tan();
        let v = &mut self.values;
        v[4] += -v[0] * tan;
        v[5] += -v[1] * tan;
    }

    pub fn scale(&mut self, x: f32, y: f32) {
        let v = &mut self.values;
        for value in &mut v[0..4] {
            *value *= x;
        }
        for value in &mut v[4..8] {
            *value *= y;
        }
    }

    pub fn translate(&mut self, x: f32, y: f32) {
        let v = &mut self.values;
        v[12] += v[0] * x + v[4] * y;
        v[13] += v[1] * x + v[5] * y;
    }

    /// Full 4x4 product `self * rhs`.
    pub fn multiply(&self, rhs: &Matrix) -> Matrix {
        let a = &self.values;
        let b = &rhs.values;
        let mut out = [0.0f32; 16];
        for col in 0..4 {
            for row in 0..4 {
                out[col * 4 + row] = (0..4).map(|k| a[k * 4 + row] * b[col * 4 + k]).sum();
            }
        }
        Matrix { values: out }
    }

    /// Applies the transform to a 2D point.
    pub fn transform_point(&self, x: f32, y: f32) -> (f32, f32) {
        let v = &self.values;
        (v[0] * x + v[4] * y + v[12], v[1] * x + v[5] * y + v[13])
    }

    pub fn to_cols(&self) -> [[f32; 4]; 4] {
        let v = &self.values;
        [
            [v[0], v[1], v[2], v[3]],
            [v[4], v[5], v[6], v[7]],
            [v[8], v[9], v[10], v[11]],
            [v[12], v[13], v[14], v[15]],
        ]
    }
}
