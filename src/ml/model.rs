use burn::{
    nn::{
        attention::generate_autoregressive_mask,
        loss::CrossEntropyLossConfig,
        Dropout, DropoutConfig,
        Embedding, EmbeddingConfig,
        LayerNorm, LayerNormConfig,
        Linear, LinearConfig,
    },
    prelude::*,
    tensor::activation::{gelu, softmax},
};

use crate::data::batcher::MbtiBatch;

// Added to attention scores of blocked positions. Finite, so a row
// with every key blocked (a pad query) softmaxes to uniform, not NaN.
const MASKED_SCORE: f32 = -1.0e9;

// NOTE: #[derive(Config)] already generates Clone and Serialize/Deserialize
// internally - do NOT add them again or you get conflicting impls.
#[derive(Config, Debug)]
pub struct Gpt2Config {
    pub vocab_size:  usize,
    pub n_positions: usize,
    pub n_embd:      usize,
    pub n_layer:     usize,
    pub n_head:      usize,
    pub num_labels:  usize,
    #[config(default = 1e-5)]
    pub layer_norm_epsilon: f64,
    #[config(default = 0.1)]
    pub dropout: f64,
}

impl Gpt2Config {
    /// Transformer body plus a freshly initialised score head.
    pub fn init<B: Backend>(&self, device: &B::Device) -> Gpt2Classifier<B> {
        self.with_body(self.init_body(device), device)
    }

    /// Wrap an existing (e.g. pretrained) body with a new score head.
    pub fn with_body<B: Backend>(&self, transformer: Gpt2Model<B>, device: &B::Device) -> Gpt2Classifier<B> {
        let score = LinearConfig::new(self.n_embd, self.num_labels)
            .with_bias(false)
            .init(device);
        Gpt2Classifier { transformer, score }
    }

    pub fn init_body<B: Backend>(&self, device: &B::Device) -> Gpt2Model<B> {
        let wte    = EmbeddingConfig::new(self.vocab_size, self.n_embd).init(device);
        let wpe    = EmbeddingConfig::new(self.n_positions, self.n_embd).init(device);
        let blocks = (0..self.n_layer)
            .map(|_| self.build_block(device))
            .collect();
        let ln_f   = self.layer_norm(device);
        let drop   = DropoutConfig::new(self.dropout).init();
        Gpt2Model { wte, wpe, drop, blocks, ln_f }
    }

    fn layer_norm<B: Backend>(&self, device: &B::Device) -> LayerNorm<B> {
        LayerNormConfig::new(self.n_embd)
            .with_epsilon(self.layer_norm_epsilon)
            .init(device)
    }

    fn build_block<B: Backend>(&self, device: &B::Device) -> Block<B> {
        let attn = Attention {
            c_attn:        LinearConfig::new(self.n_embd, 3 * self.n_embd).init(device),
            c_proj:        LinearConfig::new(self.n_embd, self.n_embd).init(device),
            attn_dropout:  DropoutConfig::new(self.dropout).init(),
            resid_dropout: DropoutConfig::new(self.dropout).init(),
            n_head:        self.n_head,
        };
        let mlp = Mlp {
            c_fc:    LinearConfig::new(self.n_embd, 4 * self.n_embd).init(device),
            c_proj:  LinearConfig::new(4 * self.n_embd, self.n_embd).init(device),
            dropout: DropoutConfig::new(self.dropout).init(),
        };
        Block {
            ln_1: self.layer_norm(device),
            attn,
            ln_2: self.layer_norm(device),
            mlp,
        }
    }
}

// ─── Attention ────────────────────────────────────────────────────────────────
/// Multi-head self-attention with a fused query/key/value projection.
#[derive(Module, Debug)]
pub struct Attention<B: Backend> {
    pub c_attn:        Linear<B>,
    pub c_proj:        Linear<B>,
    pub attn_dropout:  Dropout,
    pub resid_dropout: Dropout,
    pub n_head:        usize,
}

impl<B: Backend> Attention<B> {
    /// x: [batch, seq, n_embd], blocked: [batch, 1, seq, seq] (true = may not attend)
    pub fn forward(&self, x: Tensor<B, 3>, blocked: Tensor<B, 4, Bool>) -> Tensor<B, 3> {
        let [batch, seq, embd] = x.dims();
        let head_dim = embd / self.n_head;

        let qkv = self.c_attn.forward(x); // [batch, seq, 3 * embd]
        let q = self.split_heads(qkv.clone().slice([0..batch, 0..seq, 0..embd]));
        let k = self.split_heads(qkv.clone().slice([0..batch, 0..seq, embd..2 * embd]));
        let v = self.split_heads(qkv.slice([0..batch, 0..seq, 2 * embd..3 * embd]));

        let scores = q
            .matmul(k.swap_dims(2, 3))
            .div_scalar((head_dim as f64).sqrt());
        let scores = scores.mask_fill(
            blocked.expand([batch, self.n_head, seq, seq]),
            MASKED_SCORE,
        );
        let weights = self.attn_dropout.forward(softmax(scores, 3));

        let context = weights
            .matmul(v)                    // [batch, heads, seq, head_dim]
            .swap_dims(1, 2)
            .reshape([batch, seq, embd]);
        self.resid_dropout.forward(self.c_proj.forward(context))
    }

    /// [batch, seq, embd] -> [batch, heads, seq, head_dim]
    fn split_heads(&self, x: Tensor<B, 3>) -> Tensor<B, 4> {
        let [batch, seq, embd] = x.dims();
        x.reshape([batch, seq, self.n_head, embd / self.n_head])
            .swap_dims(1, 2)
    }
}

#[derive(Module, Debug)]
pub struct Mlp<B: Backend> {
    pub c_fc:    Linear<B>,
    pub c_proj:  Linear<B>,
    pub dropout: Dropout,
}

impl<B: Backend> Mlp<B> {
    pub fn forward(&self, x: Tensor<B, 3>) -> Tensor<B, 3> {
        self.dropout.forward(self.c_proj.forward(gelu(self.c_fc.forward(x))))
    }
}

/// Pre-norm transformer block.
#[derive(Module, Debug)]
pub struct Block<B: Backend> {
    pub ln_1: LayerNorm<B>,
    pub attn: Attention<B>,
    pub ln_2: LayerNorm<B>,
    pub mlp:  Mlp<B>,
}

impl<B: Backend> Block<B> {
    pub fn forward(&self, x: Tensor<B, 3>, blocked: Tensor<B, 4, Bool>) -> Tensor<B, 3> {
        let h = self.attn.forward(self.ln_1.forward(x.clone()), blocked);
        let x = x + h;
        let h = self.mlp.forward(self.ln_2.forward(x.clone()));
        x + h
    }
}

// ─── Gpt2Model ────────────────────────────────────────────────────────────────
/// The GPT-2 transformer body. Field names follow the published
/// checkpoint layout so pretrained weights map onto it directly.
#[derive(Module, Debug)]
pub struct Gpt2Model<B: Backend> {
    pub wte:    Embedding<B>,
    pub wpe:    Embedding<B>,
    pub drop:   Dropout,
    pub blocks: Vec<Block<B>>,
    pub ln_f:   LayerNorm<B>,
}

impl<B: Backend> Gpt2Model<B> {
    /// All inputs [batch, seq] -> hidden states [batch, seq, n_embd]
    pub fn forward(
        &self,
        input_ids:      Tensor<B, 2, Int>,
        attention_mask: Tensor<B, 2, Int>,
        position_ids:   Tensor<B, 2, Int>,
    ) -> Tensor<B, 3> {
        let [batch, seq] = input_ids.dims();
        let device       = input_ids.device();

        // A query may not look at future tokens, nor at padding.
        let future  = generate_autoregressive_mask::<B>(batch, seq, &device);
        let padding = attention_mask
            .equal_elem(0)
            .reshape([batch, 1, seq])
            .expand([batch, seq, seq]);
        let blocked = (future.int() + padding.int())
            .greater_elem(0)
            .reshape([batch, 1, seq, seq]);

        let embedded = self.wte.forward(input_ids) + self.wpe.forward(position_ids);
        let mut x = self.drop.forward(embedded);
        for block in &self.blocks {
            x = block.forward(x, blocked.clone());
        }
        self.ln_f.forward(x)
    }
}

// ─── Gpt2Classifier ───────────────────────────────────────────────────────────
#[derive(Module, Debug)]
pub struct Gpt2Classifier<B: Backend> {
    pub transformer: Gpt2Model<B>,
    pub score:       Linear<B>,
}

pub struct ClassifierOutput<B: Backend> {
    /// Mean cross-entropy over the batch - shape: [1]
    pub loss:   Tensor<B, 1>,
    /// shape: [batch, num_labels]
    pub logits: Tensor<B, 2>,
}

impl<B: Backend> Gpt2Classifier<B> {
    /// Logits read from the last position, which left padding keeps
    /// on each row's final real token.
    pub fn forward(
        &self,
        input_ids:      Tensor<B, 2, Int>,
        attention_mask: Tensor<B, 2, Int>,
        position_ids:   Tensor<B, 2, Int>,
    ) -> Tensor<B, 2> {
        let hidden = self.transformer.forward(input_ids, attention_mask, position_ids);
        let [batch, seq, embd] = hidden.dims();
        let last = hidden
            .slice([0..batch, seq - 1..seq, 0..embd])
            .reshape([batch, embd]);
        self.score.forward(last)
    }

    pub fn forward_classification(&self, batch: MbtiBatch<B>) -> ClassifierOutput<B> {
        let logits = self.forward(batch.input_ids, batch.attention_mask, batch.position_ids);
        let loss   = CrossEntropyLossConfig::new()
            .init(&logits.device())
            .forward(logits.clone(), batch.labels);
        ClassifierOutput { loss, logits }
    }

    /// Class probabilities - shape: [batch, num_labels]
    pub fn probabilities(
        &self,
        input_ids:      Tensor<B, 2, Int>,
        attention_mask: Tensor<B, 2, Int>,
        position_ids:   Tensor<B, 2, Int>,
    ) -> Tensor<B, 2> {
        softmax(self.forward(input_ids, attention_mask, position_ids), 1)
    }
}
