pub mod aabb;
pub mod vec3;
