// The logistic function σ(z) = 1 / (1 + e^-z). For negative z the equivalent form e^z / (1 + e^z)
// is used so that e^-z never overflows.
pub fn sigmoid(z: f64) -> f64 {
    if z >= 0.0 {
        1.0 / (1.0 + f64::exp(-z))
    } else {
        let e = f64::exp(z);
        e / (1.0 + e)
    }
}

// The derivative of the sigmoid expressed through its own output: if y = σ(z), then σ'(z) = y(1 - y).
// The argument must be an already-activated value, never a raw weighted sum.
pub fn sigmoid_derivative_from_output(y: f64) -> f64 {
    y * (1.0 - y)
}
