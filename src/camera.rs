//! Projections and the camera state that exposes them to shaders.

use std::rc::Rc;
use std::sync::Arc;

use cgmath::prelude::*;
use cgmath::{Deg, Matrix4, Point3, Rad, Vector3};

use crate::errors::*;
use crate::shader::input::ShaderInput;
use crate::states::State;

/// Projections in OpenGL (right handed) clip space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Projection {
    /// Orthographic projection.
    Ortho {
        /// The width of orthographic window.
        width: f32,
        /// The height of orthographic window.
        height: f32,
        near: f32,
        far: f32,
    },

    /// Perspective projection.
    Perspective {
        /// Field of view in vertical.
        fovy: Rad<f32>,
        /// The aspect of width / height.
        aspect: f32,
        near: f32,
        far: f32,
    },
}

impl Projection {
    pub fn ortho(width: f32, height: f32, near: f32, far: f32) -> Result<Self> {
        let projection = Projection::Ortho {
            width,
            height,
            near,
            far,
        };

        projection.validate()?;
        Ok(projection)
    }

    pub fn perspective<A: Into<Rad<f32>>>(fovy: A, aspect: f32, near: f32, far: f32) -> Result<Self> {
        let projection = Projection::Perspective {
            fovy: fovy.into(),
            aspect,
            near,
            far,
        };

        projection.validate()?;
        Ok(projection)
    }

    #[inline]
    pub fn near(&self) -> f32 {
        match *self {
            Projection::Ortho { near, .. } | Projection::Perspective { near, .. } => near,
        }
    }

    #[inline]
    pub fn far(&self) -> f32 {
        match *self {
            Projection::Ortho { far, .. } | Projection::Perspective { far, .. } => far,
        }
    }

    pub fn validate(&self) -> Result<()> {
        let (near, far) = (self.near(), self.far());
        if near >= far {
            return Err(Error::InvalidFrustum { near, far }.into());
        }

        match *self {
            Projection::Perspective { fovy, aspect, .. } => {
                if fovy <= Rad::zero() || fovy >= Rad::turn_div_2() {
                    let fovy: Deg<f32> = fovy.into();
                    let msg = format!("vertical field of view {:?} is not within a half turn", fovy);
                    return Err(Error::InvalidProjection(msg).into());
                }

                if aspect <= 0.0 {
                    let msg = format!("aspect ratio {} must be positive", aspect);
                    return Err(Error::InvalidProjection(msg).into());
                }

                if near <= 0.0 {
                    let msg = format!("near plane {} of a perspective must be positive", near);
                    return Err(Error::InvalidProjection(msg).into());
                }
            }
            Projection::Ortho { width, height, .. } => {
                if width <= 0.0 || height <= 0.0 {
                    let msg = format!("window {}x{} must not be empty", width, height);
                    return Err(Error::InvalidProjection(msg).into());
                }
            }
        }

        Ok(())
    }

    pub fn to_matrix(&self) -> Matrix4<f32> {
        match *self {
            Projection::Ortho {
                width,
                height,
                near,
                far,
            } => {
                let (hw, hh) = (width * 0.5, height * 0.5);
                cgmath::ortho(-hw, hw, -hh, hh, near, far)
            }
            Projection::Perspective {
                fovy,
                aspect,
                near,
                far,
            } => cgmath::perspective(fovy, aspect, near, far),
        }
    }
}

/// A state declaring the view and projection matrices of a camera.
///
/// The matrices are plain uniforms, so they may be updated from the animation
/// thread, e.g. by a camera manipulator.
pub struct Camera {
    state: Rc<State>,
    projection: Projection,
    position: Point3<f32>,
    direction: Vector3<f32>,
    up: Vector3<f32>,

    view: Arc<ShaderInput>,
    view_inverse: Arc<ShaderInput>,
    proj: Arc<ShaderInput>,
    proj_inverse: Arc<ShaderInput>,
    view_proj: Arc<ShaderInput>,
    view_proj_inverse: Arc<ShaderInput>,
    camera_position: Arc<ShaderInput>,
    near: Arc<ShaderInput>,
    far: Arc<ShaderInput>,
}

impl Camera {
    pub fn new<T: Into<String>>(name: T, projection: Projection) -> Result<Self> {
        projection.validate()?;

        let identity = Matrix4::<f32>::identity();
        let camera = Camera {
            state: State::new(name),
            projection,
            position: Point3::new(0.0, 0.0, 0.0),
            direction: Vector3::new(0.0, 0.0, -1.0),
            up: Vector3::unit_y(),
            view: ShaderInput::uniform("viewMatrix", identity),
            view_inverse: ShaderInput::uniform("inverseViewMatrix", identity),
            proj: ShaderInput::uniform("projectionMatrix", identity),
            proj_inverse: ShaderInput::uniform("inverseProjectionMatrix", identity),
            view_proj: ShaderInput::uniform("viewProjectionMatrix", identity),
            view_proj_inverse: ShaderInput::uniform("inverseViewProjectionMatrix", identity),
            camera_position: ShaderInput::uniform("cameraPosition", [0.0f32; 3]),
            near: ShaderInput::uniform("near", projection.near()),
            far: ShaderInput::uniform("far", projection.far()),
        };

        for v in camera.inputs() {
            camera.state.join_shader_input(v.clone(), None);
        }

        camera.update()?;
        Ok(camera)
    }

    /// The state to join into the scene.
    #[inline]
    pub fn state(&self) -> &Rc<State> {
        &self.state
    }

    #[inline]
    pub fn projection(&self) -> Projection {
        self.projection
    }

    pub fn set_projection(&mut self, projection: Projection) -> Result<()> {
        projection.validate()?;
        self.projection = projection;
        self.update()
    }

    #[inline]
    pub fn position(&self) -> Point3<f32> {
        self.position
    }

    pub fn look_at(&mut self, eye: Point3<f32>, center: Point3<f32>, up: Vector3<f32>) -> Result<()> {
        let direction = center - eye;
        if direction.magnitude2() <= ::std::f32::EPSILON {
            bail!("Camera looks at its own position {:?}.", eye);
        }

        self.position = eye;
        self.direction = direction.normalize();
        self.up = up;
        self.update()
    }

    pub fn inputs(&self) -> Vec<&Arc<ShaderInput>> {
        vec![
            &self.view,
            &self.view_inverse,
            &self.proj,
            &self.proj_inverse,
            &self.view_proj,
            &self.view_proj_inverse,
            &self.camera_position,
            &self.near,
            &self.far,
        ]
    }

    #[inline]
    pub fn view_matrix(&self) -> Matrix4<f32> {
        Matrix4::look_at_dir(self.position, self.direction, self.up)
    }

    /// Writes the matrices into the shader inputs.
    pub fn update(&self) -> Result<()> {
        let view = self.view_matrix();
        let proj = self.projection.to_matrix();
        let view_proj = proj * view;

        self.view.set(view)?;
        self.view_inverse.set(view.invert().unwrap_or(Matrix4::identity()))?;
        self.proj.set(proj)?;
        self.proj_inverse.set(proj.invert().unwrap_or(Matrix4::identity()))?;
        self.view_proj.set(view_proj)?;
        self.view_proj_inverse
            .set(view_proj.invert().unwrap_or(Matrix4::identity()))?;
        self.camera_position
            .set([self.position.x, self.position.y, self.position.z])?;
        self.near.set(self.projection.near())?;
        self.far.set(self.projection.far())?;
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn frustum() {
        assert!(Projection::perspective(Deg(45.0), 1.0, 0.1, 100.0).is_ok());

        let err = Projection::perspective(Deg(45.0), 1.0, 10.0, 1.0).unwrap_err();
        match err.downcast_ref::<Error>() {
            Some(Error::InvalidFrustum { near, far }) => {
                assert_eq!(*near, 10.0);
                assert_eq!(*far, 1.0);
            }
            _ => panic!("unexpected error {}", err),
        }

        assert!(Projection::perspective(Deg(45.0), 1.0, 1.0, 1.0).is_err());
        assert!(Projection::perspective(Deg(190.0), 1.0, 0.1, 1.0).is_err());
        assert!(Projection::ortho(0.0, 1.0, 0.1, 1.0).is_err());
        assert!(Projection::ortho(2.0, 2.0, -1.0, 1.0).is_ok());
    }

    #[test]
    fn camera_inputs() {
        let projection = Projection::ortho(2.0, 2.0, -1.0, 1.0).unwrap();
        let mut camera = Camera::new("camera", projection).unwrap();
        camera
            .look_at(Point3::new(0.0, 0.0, 5.0), Point3::new(0.0, 0.0, 0.0), Vector3::unit_y())
            .unwrap();

        let state = camera.state();
        let view: Matrix4<f32> = state.find_shader_input("viewMatrix").unwrap().get().unwrap();
        let origin = view * cgmath::Vector4::new(0.0, 0.0, 0.0, 1.0);
        assert!((origin.z + 5.0).abs() < 1e-5);

        let far: f32 = state.find_shader_input("far").unwrap().get().unwrap();
        assert_eq!(far, 1.0);

        let eye = Point3::new(1.0, 1.0, 1.0);
        assert!(camera.look_at(eye, eye, Vector3::unit_y()).is_err());
    }
}
