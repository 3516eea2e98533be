use nalgebra::{DMatrix, Point3, Vector3};

pub fn distance(a: &Point3<f64>, b: &Point3<f64>) -> f64 {
    (a - b).norm()
}

/// Angle at `b` formed by `a-b-c`, in degrees.
pub fn angle(a: &Point3<f64>, b: &Point3<f64>, c: &Point3<f64>) -> f64 {
    let u = a - b;
    let v = c - b;
    let denom = u.norm() * v.norm();
    if denom == 0.0 {
        return 0.0;
    }
    (u.dot(&v) / denom).clamp(-1.0, 1.0).acos().to_degrees()
}

/// Dihedral angle `a-b-c-d` in degrees, in (-180, 180], IUPAC sign convention.
///
/// Degenerate (collinear) input yields 0.
pub fn dihedral(a: &Point3<f64>, b: &Point3<f64>, c: &Point3<f64>, d: &Point3<f64>) -> f64 {
    let b0 = a - b;
    let b1 = c - b;
    let b2 = d - c;

    let b1_norm = b1.norm();
    if b1_norm == 0.0 {
        return 0.0;
    }
    let b1 = b1 / b1_norm;

    let v = b0 - b1 * b0.dot(&b1);
    let w = b2 - b1 * b2.dot(&b1);
    if v.norm() == 0.0 || w.norm() == 0.0 {
        return 0.0;
    }

    let x = v.dot(&w);
    let y = b1.cross(&v).dot(&w);
    y.atan2(x).to_degrees()
}

pub fn centroid(points: &[Point3<f64>]) -> Option<Point3<f64>> {
    if points.is_empty() {
        return None;
    }
    let sum: Vector3<f64> = points.iter().map(|p| p.coords).sum();
    Some(Point3::from(sum / points.len() as f64))
}

/// Root-mean-square distance of the points to their least-squares plane.
///
/// The plane normal is the right singular vector with the smallest singular
/// value of the centred coordinates; the RMS distance is that singular value
/// over `sqrt(n)`. Fewer than three points have no defined plane.
pub fn plane_rmsd(points: &[Point3<f64>]) -> Option<f64> {
    if points.len() < 3 {
        return None;
    }
    let center = centroid(points)?;
    let centred = DMatrix::from_fn(points.len(), 3, |row, col| points[row][col] - center[col]);
    let svd = centred.svd(false, false);
    let smallest = svd.singular_values.iter().copied().fold(f64::INFINITY, f64::min);
    Some(smallest / (points.len() as f64).sqrt())
}

/// Ideal C-beta position for an L-amino acid built from its N, CA and C atoms.
///
/// Uses the tetrahedral placement commonly used for virtual C-beta atoms: a fixed
/// linear combination of the N->CA and CA->C bond vectors and their cross product,
/// giving a CA-CB distance of about 1.53 Angstrom.
pub fn calculate_cb_position(
    n_pos: &Point3<f64>,
    ca_pos: &Point3<f64>,
    c_pos: &Point3<f64>,
) -> Point3<f64> {
    let b = ca_pos - n_pos;
    let c = c_pos - ca_pos;
    let a = b.cross(&c);
    ca_pos + a * -0.582_734_31 + b * 0.568_028_27 + c * -0.540_674_66
}

/// Root-mean-square deviation between two paired coordinate sets.
pub fn calculate_rmsd(coords1: &[Point3<f64>], coords2: &[Point3<f64>]) -> Option<f64> {
    if coords1.len() != coords2.len() || coords1.is_empty() {
        return None;
    }
    let sum_sq: f64 = coords1
        .iter()
        .zip(coords2)
        .map(|(p1, p2)| (p1 - p2).norm_squared())
        .sum();
    Some((sum_sq / coords1.len() as f64).sqrt())
}
