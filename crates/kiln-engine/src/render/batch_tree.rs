use std::collections::{HashMap, VecDeque};

use crate::device::{ProgramHandle, TextureHandle};

/// Render state that must not change within a batch.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct BatchKey {
    pub program: ProgramHandle,
    pub texture: TextureHandle,
}

#[derive(Debug)]
struct TextureBucket<T> {
    texture: TextureHandle,
    queue: VecDeque<T>,
}

#[derive(Debug)]
struct ShaderBucket<T> {
    program: ProgramHandle,
    textures: Vec<TextureBucket<T>>,
    by_texture: HashMap<TextureHandle, usize>,
}

/// Groups queued opaque draws by shader, then by texture.
///
/// Draining visits shaders in the order they were first seen this frame,
/// each shader's textures in first-seen order, and each texture's draws in
/// FIFO order.
#[derive(Debug)]
pub struct DrawableBatchTree<T> {
    shaders: Vec<ShaderBucket<T>>,
    by_program: HashMap<ProgramHandle, usize>,
    len: usize,
}

impl<T> Default for DrawableBatchTree<T> {
    fn default() -> Self {
        Self {
            shaders: Vec::new(),
            by_program: HashMap::new(),
            len: 0,
        }
    }
}

impl<T> DrawableBatchTree<T> {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn add(&mut self, key: BatchKey, item: T) {
        let s = *self.by_program.entry(key.program).or_insert_with(|| {
            self.shaders.push(ShaderBucket {
                program: key.program,
                textures: Vec::new(),
                by_texture: HashMap::new(),
            });
            self.shaders.len() - 1
        });
        let shader = &mut self.shaders[s];

        let t = *shader.by_texture.entry(key.texture).or_insert_with(|| {
            shader.textures.push(TextureBucket {
                texture: key.texture,
                queue: VecDeque::new(),
            });
            shader.textures.len() - 1
        });
        shader.textures[t].queue.push_back(item);
        self.len += 1;
    }

    /// Removes every queued item in batch order.
    pub fn drain(&mut self) -> Vec<(BatchKey, T)> {
        let mut out = Vec::with_capacity(self.len);
        for shader in self.shaders.drain(..) {
            for bucket in shader.textures {
                let key = BatchKey {
                    program: shader.program,
                    texture: bucket.texture,
                };
                out.extend(bucket.queue.into_iter().map(|item| (key, item)));
            }
        }
        self.by_program.clear();
        self.len = 0;
        out
    }

    pub fn clear(&mut self) {
        self.shaders.clear();
        self.by_program.clear();
        self.len = 0;
    }
}
