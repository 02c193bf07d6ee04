use glam::{vec3, vec4, EulerRot, Mat4, Quat, Vec3, Vec4};

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Transform {
    pub position: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            scale: Vec3::ONE,
        }
    }
}

impl Transform {
    pub fn matrix(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(self.scale, self.rotation, self.position)
    }
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Camera {
    pub position: Vec3,
    pub target: Vec3,
    /// Vertical field of view in degrees.
    pub fov: f32,
    pub near: f32,
    pub far: f32,
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            position: vec3(0., 0., 5.),
            target: Vec3::ZERO,
            fov: 75.,
            near: 0.1,
            far: 1000.,
        }
    }
}

impl Camera {
    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_at_rh(self.position, self.target, Vec3::Y)
    }

    pub fn projection_matrix(&self, aspect_ratio: f32) -> Mat4 {
        Mat4::perspective_rh(self.fov.to_radians(), aspect_ratio, self.near, self.far)
    }
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct PointMaterial {
    pub color: Vec4,
    /// World units when attenuated, pixels otherwise.
    pub size: f32,
    pub size_attenuation: bool,
    /// Lower bound on the on-screen size so distant points never vanish.
    pub min_pixel_size: f32,
}

impl PointMaterial {
    /// Pink sub-pixel stars.
    pub fn stars() -> Self {
        Self {
            color: srgb(0xf2, 0x72, 0xc8, 1.0),
            size: 0.002,
            size_attenuation: true,
            min_pixel_size: 1.,
        }
    }

    pub fn spinner() -> Self {
        Self {
            color: vec4(0.95, 0.95, 0.95, 1.0),
            size: 6.,
            size_attenuation: false,
            min_pixel_size: 1.,
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct MeshMaterial {
    pub color: Vec4,
    pub flat_shading: bool,
    pub ambient: f32,
    /// Direction towards the light in world space.
    pub light_direction: Vec3,
}

impl MeshMaterial {
    pub fn ball() -> Self {
        Self {
            color: srgb(0xff, 0xf8, 0xeb, 1.0),
            flat_shading: true,
            ambient: 0.25,
            light_direction: Vec3::Z,
        }
    }

    pub fn planet() -> Self {
        Self {
            color: Vec4::ONE,
            flat_shading: false,
            ambient: 0.45,
            light_direction: vec3(-1., 1., 1.).normalize(),
        }
    }
}

/// A texture projected through a unit box onto a mesh surface.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Decal {
    pub transform: Transform,
}

impl Decal {
    /// Front facing decal used on the technology balls.
    pub fn front() -> Self {
        Self {
            transform: Transform {
                position: vec3(0., 0., 1.),
                rotation: Quat::from_euler(EulerRot::XYZ, 2. * std::f32::consts::PI, 0., 6.25),
                scale: Vec3::ONE,
            },
        }
    }

    /// Maps mesh space into the decal box, where the box spans `[-0.5, 0.5]`
    /// on every axis.
    pub fn projection(&self) -> Mat4 {
        self.transform.matrix().inverse()
    }
}

fn srgb(r: u8, g: u8, b: u8, a: f32) -> Vec4 {
    let linear = |c: u8| (c as f32 / 255.).powf(2.2);
    vec4(linear(r), linear(g), linear(b), a)
}
