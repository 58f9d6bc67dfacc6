/// Simulation scalar. The whole model runs in f32; keyframe hosts do too.
pub type Scalar = f32;
