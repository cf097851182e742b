use serde::{Deserialize, Serialize};

/// A 2D point.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point2D {
    pub x: f64,
    pub y: f64,
}

impl Point2D {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn zero() -> Self {
        Self { x: 0.0, y: 0.0 }
    }
}

impl Default for Point2D {
    fn default() -> Self {
        Self::zero()
    }
}

/// A 3x3 row-major matrix acting on homogeneous 2D points.
///
/// Used as a plane-to-screen homography for layers with 3D rotation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Mat3 {
    pub m: [[f64; 3]; 3],
}

/// Homogeneous `w` below which a point is treated as behind the viewer.
const MIN_W: f64 = 1e-6;

impl Mat3 {
    pub fn identity() -> Self {
        Self {
            m: [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]],
        }
    }

    pub fn translate(tx: f64, ty: f64) -> Self {
        Self {
            m: [[1.0, 0.0, tx], [0.0, 1.0, ty], [0.0, 0.0, 1.0]],
        }
    }

    /// `self * rhs`: applies `rhs` first.
    pub fn mul(&self, rhs: &Mat3) -> Mat3 {
        let mut out = [[0.0; 3]; 3];
        for (i, row) in out.iter_mut().enumerate() {
            for (j, cell) in row.iter_mut().enumerate() {
                *cell = (0..3).map(|k| self.m[i][k] * rhs.m[k][j]).sum();
            }
        }
        Mat3 { m: out }
    }

    pub fn determinant(&self) -> f64 {
        let m = &self.m;
        m[0][0] * (m[1][1] * m[2][2] - m[1][2] * m[2][1])
            - m[0][1] * (m[1][0] * m[2][2] - m[1][2] * m[2][0])
            + m[0][2] * (m[1][0] * m[2][1] - m[1][1] * m[2][0])
    }

    /// Inverse via the adjugate. None when the matrix is singular.
    pub fn inverse(&self) -> Option<Mat3> {
        let det = self.determinant();
        if det.abs() < 1e-12 {
            return None;
        }
        let m = &self.m;
        let inv_det = 1.0 / det;
        let cof = |r0: usize, r1: usize, c0: usize, c1: usize| {
            m[r0][c0] * m[r1][c1] - m[r0][c1] * m[r1][c0]
        };
        Some(Mat3 {
            m: [
                [
                    cof(1, 2, 1, 2) * inv_det,
                    -cof(0, 2, 1, 2) * inv_det,
                    cof(0, 1, 1, 2) * inv_det,
                ],
                [
                    -cof(1, 2, 0, 2) * inv_det,
                    cof(0, 2, 0, 2) * inv_det,
                    -cof(0, 1, 0, 2) * inv_det,
                ],
                [
                    cof(1, 2, 0, 1) * inv_det,
                    -cof(0, 2, 0, 1) * inv_det,
                    cof(0, 1, 0, 1) * inv_det,
                ],
            ],
        })
    }

    /// Map a point, dividing by `w`. None when `w` is not positive.
    pub fn apply(&self, p: Point2D) -> Option<Point2D> {
        let m = &self.m;
        let x = m[0][0] * p.x + m[0][1] * p.y + m[0][2];
        let y = m[1][0] * p.x + m[1][1] * p.y + m[1][2];
        let w = m[2][0] * p.x + m[2][1] * p.y + m[2][2];
        if w <= MIN_W {
            return None;
        }
        Some(Point2D::new(x / w, y / w))
    }
}

impl Default for Mat3 {
    fn default() -> Self {
        Self::identity()
    }
}

/// A 4x4 row-major matrix in CSS transform conventions (y down, degrees).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Mat4 {
    pub m: [[f64; 4]; 4],
}

impl Mat4 {
    pub fn identity() -> Self {
        let mut m = [[0.0; 4]; 4];
        for (i, row) in m.iter_mut().enumerate() {
            row[i] = 1.0;
        }
        Self { m }
    }

    pub fn translate(tx: f64, ty: f64, tz: f64) -> Self {
        let mut out = Self::identity();
        out.m[0][3] = tx;
        out.m[1][3] = ty;
        out.m[2][3] = tz;
        out
    }

    pub fn scale(sx: f64, sy: f64) -> Self {
        let mut out = Self::identity();
        out.m[0][0] = sx;
        out.m[1][1] = sy;
        out
    }

    pub fn rotate_z(degrees: f64) -> Self {
        let (s, c) = degrees.to_radians().sin_cos();
        let mut out = Self::identity();
        out.m[0][0] = c;
        out.m[0][1] = -s;
        out.m[1][0] = s;
        out.m[1][1] = c;
        out
    }

    pub fn rotate_x(degrees: f64) -> Self {
        let (s, c) = degrees.to_radians().sin_cos();
        let mut out = Self::identity();
        out.m[1][1] = c;
        out.m[1][2] = -s;
        out.m[2][1] = s;
        out.m[2][2] = c;
        out
    }

    pub fn rotate_y(degrees: f64) -> Self {
        let (s, c) = degrees.to_radians().sin_cos();
        let mut out = Self::identity();
        out.m[0][0] = c;
        out.m[0][2] = s;
        out.m[2][0] = -s;
        out.m[2][2] = c;
        out
    }

    /// CSS `perspective(d)`: points with positive z move toward the viewer.
    pub fn perspective(distance: f64) -> Self {
        let mut out = Self::identity();
        if distance > 0.0 {
            out.m[3][2] = -1.0 / distance;
        }
        out
    }

    /// `self * rhs`: applies `rhs` first.
    pub fn mul(&self, rhs: &Mat4) -> Mat4 {
        let mut out = [[0.0; 4]; 4];
        for (i, row) in out.iter_mut().enumerate() {
            for (j, cell) in row.iter_mut().enumerate() {
                *cell = (0..4).map(|k| self.m[i][k] * rhs.m[k][j]).sum();
            }
        }
        Mat4 { m: out }
    }

    /// Restrict to the z = 0 plane, dropping the z row and column.
    pub fn plane_homography(&self) -> Mat3 {
        let pick = [0usize, 1, 3];
        let mut m = [[0.0; 3]; 3];
        for (i, &r) in pick.iter().enumerate() {
            for (j, &c) in pick.iter().enumerate() {
                m[i][j] = self.m[r][c];
            }
        }
        Mat3 { m }
    }
}

impl Default for Mat4 {
    fn default() -> Self {
        Self::identity()
    }
}
