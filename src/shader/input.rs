//! Typed, named values that feed uniforms and vertex attributes.
//!
//! A `ShaderInput` owns a raw byte buffer holding one or more elements of a
//! single `InputFormat`. Every mutation bumps a monotonically increasing
//! stamp, so consumers (like a bound `Shader`) re-upload only when the stamp
//! they last saw is older than the current one.
//!
//! Inputs are shared as `Arc<ShaderInput>` and may be written from the
//! animation thread while the render thread reads them.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};

use byteorder::{ByteOrder, NativeEndian};
use cgmath::{Matrix3, Matrix4, Vector2, Vector3, Vector4};

use crate::errors::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ScalarKind {
    Float,
    Int,
    UInt,
    Double,
}

impl ScalarKind {
    #[inline]
    pub fn size(self) -> usize {
        match self {
            ScalarKind::Double => 8,
            _ => 4,
        }
    }
}

/// Element layout of a `ShaderInput`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum InputFormat {
    /// A scalar or a vector with 1 to 4 components.
    Vector(ScalarKind, u8),
    Mat3,
    Mat4,
}

impl InputFormat {
    /// Number of scalar components in one element.
    pub fn components(self) -> usize {
        match self {
            InputFormat::Vector(_, n) => n as usize,
            InputFormat::Mat3 => 9,
            InputFormat::Mat4 => 16,
        }
    }

    pub fn scalar(self) -> ScalarKind {
        match self {
            InputFormat::Vector(kind, _) => kind,
            _ => ScalarKind::Float,
        }
    }

    /// Size of one element in bytes.
    #[inline]
    pub fn size(self) -> usize {
        self.components() * self.scalar().size()
    }

    /// The matching GLSL type name.
    pub fn glsl_type(self) -> &'static str {
        match self {
            InputFormat::Vector(ScalarKind::Float, 1) => "float",
            InputFormat::Vector(ScalarKind::Float, 2) => "vec2",
            InputFormat::Vector(ScalarKind::Float, 3) => "vec3",
            InputFormat::Vector(ScalarKind::Float, _) => "vec4",
            InputFormat::Vector(ScalarKind::Int, 1) => "int",
            InputFormat::Vector(ScalarKind::Int, 2) => "ivec2",
            InputFormat::Vector(ScalarKind::Int, 3) => "ivec3",
            InputFormat::Vector(ScalarKind::Int, _) => "ivec4",
            InputFormat::Vector(ScalarKind::UInt, 1) => "uint",
            InputFormat::Vector(ScalarKind::UInt, 2) => "uvec2",
            InputFormat::Vector(ScalarKind::UInt, 3) => "uvec3",
            InputFormat::Vector(ScalarKind::UInt, _) => "uvec4",
            InputFormat::Vector(ScalarKind::Double, 1) => "double",
            InputFormat::Vector(ScalarKind::Double, 2) => "dvec2",
            InputFormat::Vector(ScalarKind::Double, 3) => "dvec3",
            InputFormat::Vector(ScalarKind::Double, _) => "dvec4",
            InputFormat::Mat3 => "mat3",
            InputFormat::Mat4 => "mat4",
        }
    }
}

impl fmt::Display for InputFormat {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.glsl_type())
    }
}

/// How many values an input carries and how they are consumed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Cardinality {
    /// Exactly one value, uploaded as a uniform.
    Uniform,
    /// One value per vertex.
    Vertex(usize),
    /// One value per `divisor` instances.
    Instanced { instances: usize, divisor: u32 },
}

impl Cardinality {
    #[inline]
    pub fn elements(self) -> usize {
        match self {
            Cardinality::Uniform => 1,
            Cardinality::Vertex(n) => n,
            Cardinality::Instanced { instances, .. } => instances,
        }
    }
}

/// Values that could be stored in a `ShaderInput`.
pub trait InputValue: Sized {
    const FORMAT: InputFormat;

    /// Writes this value into `out`, which is exactly `FORMAT.size()` bytes.
    fn write(&self, out: &mut [u8]);

    /// Reads a value from exactly `FORMAT.size()` bytes.
    fn read(bytes: &[u8]) -> Self;
}

macro_rules! impl_scalar {
    ($ty:ty, $kind:ident, $write:ident, $read:ident) => {
        impl InputValue for $ty {
            const FORMAT: InputFormat = InputFormat::Vector(ScalarKind::$kind, 1);

            #[inline]
            fn write(&self, out: &mut [u8]) {
                NativeEndian::$write(out, *self);
            }

            #[inline]
            fn read(bytes: &[u8]) -> Self {
                NativeEndian::$read(bytes)
            }
        }
    };
}

impl_scalar!(f32, Float, write_f32, read_f32);
impl_scalar!(i32, Int, write_i32, read_i32);
impl_scalar!(u32, UInt, write_u32, read_u32);
impl_scalar!(f64, Double, write_f64, read_f64);

macro_rules! impl_array {
    ($ty:ty, $kind:ident, $n:expr) => {
        impl InputValue for [$ty; $n] {
            const FORMAT: InputFormat = InputFormat::Vector(ScalarKind::$kind, $n);

            fn write(&self, out: &mut [u8]) {
                let stride = <$ty as InputValue>::FORMAT.size();
                for (i, v) in self.iter().enumerate() {
                    v.write(&mut out[i * stride..(i + 1) * stride]);
                }
            }

            fn read(bytes: &[u8]) -> Self {
                let stride = <$ty as InputValue>::FORMAT.size();
                let mut values = [<$ty>::default(); $n];
                for (i, v) in values.iter_mut().enumerate() {
                    *v = <$ty as InputValue>::read(&bytes[i * stride..(i + 1) * stride]);
                }
                values
            }
        }
    };
}

impl_array!(f32, Float, 2);
impl_array!(f32, Float, 3);
impl_array!(f32, Float, 4);
impl_array!(i32, Int, 2);
impl_array!(i32, Int, 3);
impl_array!(i32, Int, 4);
impl_array!(u32, UInt, 2);
impl_array!(u32, UInt, 3);
impl_array!(u32, UInt, 4);
impl_array!(f64, Double, 2);
impl_array!(f64, Double, 3);
impl_array!(f64, Double, 4);

macro_rules! impl_vector {
    ($ty:ident, $n:expr) => {
        impl InputValue for $ty<f32> {
            const FORMAT: InputFormat = InputFormat::Vector(ScalarKind::Float, $n);

            #[inline]
            fn write(&self, out: &mut [u8]) {
                let v: &[f32; $n] = self.as_ref();
                v.write(out);
            }

            #[inline]
            fn read(bytes: &[u8]) -> Self {
                <[f32; $n] as InputValue>::read(bytes).into()
            }
        }
    };
}

impl_vector!(Vector2, 2);
impl_vector!(Vector3, 3);
impl_vector!(Vector4, 4);

impl InputValue for Matrix3<f32> {
    const FORMAT: InputFormat = InputFormat::Mat3;

    fn write(&self, out: &mut [u8]) {
        let m: &[f32; 9] = self.as_ref();
        NativeEndian::write_f32_into(m, out);
    }

    fn read(bytes: &[u8]) -> Self {
        let mut m = [0.0f32; 9];
        NativeEndian::read_f32_into(bytes, &mut m);
        Matrix3::new(m[0], m[1], m[2], m[3], m[4], m[5], m[6], m[7], m[8])
    }
}

impl InputValue for Matrix4<f32> {
    const FORMAT: InputFormat = InputFormat::Mat4;

    fn write(&self, out: &mut [u8]) {
        let m: &[f32; 16] = self.as_ref();
        NativeEndian::write_f32_into(m, out);
    }

    fn read(bytes: &[u8]) -> Self {
        let mut m = [0.0f32; 16];
        NativeEndian::read_f32_into(bytes, &mut m);
        Matrix4::new(
            m[0], m[1], m[2], m[3], m[4], m[5], m[6], m[7], m[8], m[9], m[10], m[11], m[12],
            m[13], m[14], m[15],
        )
    }
}

struct InputData {
    cardinality: Cardinality,
    bytes: Vec<u8>,
}

pub struct ShaderInput {
    name: String,
    format: InputFormat,
    data: RwLock<InputData>,
    stamp: AtomicUsize,
    constant: AtomicBool,
}

impl fmt::Debug for ShaderInput {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("ShaderInput")
            .field("name", &self.name)
            .field("format", &self.format)
            .field("cardinality", &self.cardinality())
            .field("stamp", &self.stamp())
            .finish()
    }
}

impl ShaderInput {
    /// Creates a zero initialized uniform.
    pub fn new<T: Into<String>>(name: T, format: InputFormat) -> Self {
        ShaderInput {
            name: name.into(),
            format,
            data: RwLock::new(InputData {
                cardinality: Cardinality::Uniform,
                bytes: vec![0; format.size()],
            }),
            stamp: AtomicUsize::new(0),
            constant: AtomicBool::new(false),
        }
    }

    /// Creates a shared uniform holding `value`.
    pub fn uniform<N: Into<String>, T: InputValue>(name: N, value: T) -> Arc<Self> {
        let input = ShaderInput::new(name, T::FORMAT);
        {
            let mut data = input.data.write().unwrap();
            value.write(&mut data.bytes);
        }

        Arc::new(input)
    }

    /// Creates a shared per-vertex attribute.
    pub fn vertex<N: Into<String>, T: InputValue>(name: N, values: &[T]) -> Arc<Self> {
        Arc::new(ShaderInput::with_elements(
            name,
            Cardinality::Vertex(values.len()),
            values,
        ))
    }

    /// Creates a shared per-instance attribute advancing every `divisor` instances.
    pub fn instanced<N: Into<String>, T: InputValue>(
        name: N,
        values: &[T],
        divisor: u32,
    ) -> Arc<Self> {
        let cardinality = Cardinality::Instanced {
            instances: values.len(),
            divisor: divisor.max(1),
        };

        Arc::new(ShaderInput::with_elements(name, cardinality, values))
    }

    fn with_elements<N: Into<String>, T: InputValue>(
        name: N,
        cardinality: Cardinality,
        values: &[T],
    ) -> Self {
        let input = ShaderInput::new(name, T::FORMAT);
        {
            let mut data = input.data.write().unwrap();
            data.cardinality = cardinality;
            data.bytes = Self::encode(values);
        }

        input
    }

    fn encode<T: InputValue>(values: &[T]) -> Vec<u8> {
        let stride = T::FORMAT.size();
        let mut bytes = vec![0; stride * values.len()];
        for (i, v) in values.iter().enumerate() {
            v.write(&mut bytes[i * stride..(i + 1) * stride]);
        }
        bytes
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn format(&self) -> InputFormat {
        self.format
    }

    #[inline]
    pub fn cardinality(&self) -> Cardinality {
        self.data.read().unwrap().cardinality
    }

    /// Number of elements stored.
    #[inline]
    pub fn len(&self) -> usize {
        self.cardinality().elements()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[inline]
    pub fn is_vertex_attribute(&self) -> bool {
        self.cardinality() != Cardinality::Uniform
    }

    /// Number of instances fed by this input, 1 unless it is instanced.
    pub fn num_instances(&self) -> usize {
        match self.cardinality() {
            Cardinality::Instanced { instances, divisor } => instances * divisor as usize,
            _ => 1,
        }
    }

    /// The change counter. Strictly increases with every mutation.
    #[inline]
    pub fn stamp(&self) -> usize {
        self.stamp.load(Ordering::Acquire)
    }

    #[inline]
    pub fn is_constant(&self) -> bool {
        self.constant.load(Ordering::Relaxed)
    }

    /// Marks the input as never changing after initialization. This is a hint
    /// for consumers and does not reject later writes.
    #[inline]
    pub fn set_constant(&self, constant: bool) {
        self.constant.store(constant, Ordering::Relaxed);
    }

    fn check<T: InputValue>(&self) -> Result<()> {
        if T::FORMAT != self.format {
            return Err(Error::InputMismatch {
                name: self.name.clone(),
                expected: self.format.to_string(),
                found: T::FORMAT.to_string(),
            }
            .into());
        }

        Ok(())
    }

    #[inline]
    fn touch(&self) {
        self.stamp.fetch_add(1, Ordering::AcqRel);
    }

    /// Sets the first element, which is the whole value of a uniform.
    #[inline]
    pub fn set<T: InputValue>(&self, value: T) -> Result<()> {
        self.set_element(0, value)
    }

    /// Sets the element at `index`.
    pub fn set_element<T: InputValue>(&self, index: usize, value: T) -> Result<()> {
        self.check::<T>()?;

        let stride = self.format.size();
        let mut data = self.data.write().unwrap();
        let len = data.cardinality.elements();
        if index >= len {
            return Err(Error::InputOutOfBounds {
                name: self.name.clone(),
                index,
                len,
            }
            .into());
        }

        value.write(&mut data.bytes[index * stride..(index + 1) * stride]);
        self.touch();
        Ok(())
    }

    /// Replaces all elements. A uniform must receive exactly one value, while
    /// attributes are resized to the number of values given.
    pub fn set_elements<T: InputValue>(&self, values: &[T]) -> Result<()> {
        self.check::<T>()?;

        let mut data = self.data.write().unwrap();
        data.cardinality = match data.cardinality {
            Cardinality::Uniform if values.len() != 1 => {
                return Err(Error::InputOutOfBounds {
                    name: self.name.clone(),
                    index: values.len(),
                    len: 1,
                }
                .into());
            }
            Cardinality::Uniform => Cardinality::Uniform,
            Cardinality::Vertex(_) => Cardinality::Vertex(values.len()),
            Cardinality::Instanced { divisor, .. } => Cardinality::Instanced {
                instances: values.len(),
                divisor,
            },
        };

        data.bytes = Self::encode(values);
        self.touch();
        Ok(())
    }

    #[inline]
    pub fn get<T: InputValue>(&self) -> Result<T> {
        self.element(0)
    }

    pub fn element<T: InputValue>(&self, index: usize) -> Result<T> {
        self.check::<T>()?;

        let stride = self.format.size();
        let data = self.data.read().unwrap();
        let len = data.cardinality.elements();
        if index >= len {
            return Err(Error::InputOutOfBounds {
                name: self.name.clone(),
                index,
                len,
            }
            .into());
        }

        Ok(T::read(&data.bytes[index * stride..(index + 1) * stride]))
    }

    /// Runs `func` with the raw bytes and the stamp they belong to.
    pub fn with_bytes<F, R>(&self, func: F) -> R
    where
        F: FnOnce(&[u8], usize) -> R,
    {
        let data = self.data.read().unwrap();
        func(&data.bytes, self.stamp())
    }
}

/// A `ShaderInput` declared under a (possibly overridden) name.
#[derive(Debug, Clone)]
pub struct NamedInput {
    pub name: String,
    pub input: Arc<ShaderInput>,
}

impl NamedInput {
    pub fn new(input: Arc<ShaderInput>, name: Option<&str>) -> Self {
        let name = match name {
            Some(v) if !v.is_empty() => v.to_owned(),
            _ => input.name().to_owned(),
        };

        NamedInput { name, input }
    }
}
