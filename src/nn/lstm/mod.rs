/*
 * @Author       : 老董
 * @Date         : 2026-02-10
 * @Description  : Lstm - 批量LSTM层的公开接口与形状校验
 *
 * 公式:
 *   a_t = h_{t-1} @ Wh + x_t @ Wx + b                # 融合预激活，一次GEMM
 *   [i|f|o|g] = a_t 按固定列序切成四个H宽的门块
 *   i_t, f_t, o_t = σ(·)    g_t = tanh(·)
 *   c_t = f_t ⊙ c_{t-1} + i_t ⊙ g_t                  # 细胞状态
 *   h_t = tanh(c_t) ⊙ o_t                            # 隐藏状态
 *
 * 维度约定（与 PyTorch 对齐）:
 * - x: [batch, seq_len, input_size]
 * - h0/c0: [batch, hidden_size]
 * - 输出 h: [batch, seq_len, hidden_size]
 *
 * 前向只读参数、只写缓存；反向只读参数与缓存、只写梯度累积器并返回
 * 输入梯度。两者都要求`&mut self`，以所有权制度落实缓存的单写者约束——
 * 同一实例的并发调用需由调用方在外部串行化。
 */

mod backward;
mod forward;
mod store;

use crate::errors::LstmError;
use ndarray::{Array1, Array2, Array3};
use rand::SeedableRng;
use rand::rngs::StdRng;
use store::LstmStore;

/// 批量LSTM层：手工推导梯度的前向/反向计算核心
///
/// 每个实例独占自己的参数、梯度累积器、前向缓存与暂存缓冲。
/// `forward`运行一次写满缓存，`backward`逆序读缓存并累积梯度；
/// 两者之间缓存必须保持有效（中途不得再次`forward`或改动参数）。
pub struct Lstm {
    input_size: usize,
    hidden_size: usize,
    store: LstmStore,
    rng: StdRng,
    /// 最近一次前向的(batch, seq_len)；None表示缓存未就绪
    ready: Option<(usize, usize)>,
}

impl Lstm {
    /// 创建LSTM层，W服从N(0, 1/(D+H))，b为零
    pub fn new(input_size: usize, hidden_size: usize) -> Self {
        Self::from_rng(input_size, hidden_size, StdRng::from_entropy())
    }

    /// 创建LSTM层（固定随机种子，可复现初始化）
    pub fn new_with_seed(input_size: usize, hidden_size: usize, seed: u64) -> Self {
        Self::from_rng(input_size, hidden_size, StdRng::seed_from_u64(seed))
    }

    fn from_rng(input_size: usize, hidden_size: usize, mut rng: StdRng) -> Self {
        let store = LstmStore::new(input_size, hidden_size, &mut rng);
        Self {
            input_size,
            hidden_size,
            store,
            rng,
            ready: None,
        }
    }

    /// 重新初始化参数：W服从N(0, std²)（`std`缺省为1/√(D+H)），b清零。
    /// 参数变动后既有前向缓存作废。
    pub fn reset_parameters(&mut self, std: Option<f64>) {
        let std_dev = std.unwrap_or_else(|| LstmStore::default_std(self.input_size, self.hidden_size));
        self.store
            .reset_parameters(self.input_size, self.hidden_size, std_dev, &mut self.rng);
        self.ready = None;
    }

    /// 清零W与b的梯度累积器
    pub fn zero_grad(&mut self) {
        self.store.zero_grad();
    }

    pub fn input_size(&self) -> usize {
        self.input_size
    }

    pub fn hidden_size(&self) -> usize {
        self.hidden_size
    }

    /// 权重矩阵W: [D+H, 4H]（行分块[Wx; Wh]，列分块[i|f|o|g]）
    pub fn weight(&self) -> &Array2<f64> {
        &self.store.w
    }

    /// 偏置b: [4H]
    pub fn bias(&self) -> &Array1<f64> {
        &self.store.b
    }

    /// W的梯度累积器
    pub fn grad_weight(&self) -> &Array2<f64> {
        &self.store.grad_w
    }

    /// b的梯度累积器
    pub fn grad_bias(&self) -> &Array1<f64> {
        &self.store.grad_b
    }

    /// 整体替换权重（形状校验后）。参数变动后既有前向缓存作废。
    pub fn set_weight(&mut self, w: &Array2<f64>) -> Result<(), LstmError> {
        let expected = [self.input_size + self.hidden_size, 4 * self.hidden_size];
        check_shape("权重W", &expected, &[w.nrows(), w.ncols()])?;
        self.store.w.assign(w);
        self.ready = None;
        Ok(())
    }

    /// 整体替换偏置（形状校验后）。参数变动后既有前向缓存作废。
    pub fn set_bias(&mut self, b: &Array1<f64>) -> Result<(), LstmError> {
        check_shape("偏置b", &[4 * self.hidden_size], &[b.len()])?;
        self.store.b.assign(b);
        self.ready = None;
        Ok(())
    }

    /// 校验一次前向/反向调用的输入形状。任何缓存或缓冲被改写之前必须先通过这里。
    fn check_call_shapes(
        &self,
        h0: &Array2<f64>,
        c0: &Array2<f64>,
        x: &Array3<f64>,
    ) -> Result<(usize, usize), LstmError> {
        let (batch, seq_len, input) = x.dim();
        check_shape(
            "输入序列x",
            &[batch, seq_len, self.input_size],
            &[batch, seq_len, input],
        )?;
        let (h0_rows, h0_cols) = h0.dim();
        check_shape("初始隐藏状态h0", &[batch, self.hidden_size], &[h0_rows, h0_cols])?;
        let (c0_rows, c0_cols) = c0.dim();
        check_shape("初始细胞状态c0", &[batch, self.hidden_size], &[c0_rows, c0_cols])?;
        Ok((batch, seq_len))
    }

    #[cfg(test)]
    pub(crate) fn gate_cache(&self) -> &Array3<f64> {
        &self.store.gates
    }

    #[cfg(test)]
    pub(crate) fn cell_cache(&self) -> &Array3<f64> {
        &self.store.cells
    }
}

fn check_shape(name: &str, expected: &[usize], got: &[usize]) -> Result<(), LstmError> {
    if expected == got {
        Ok(())
    } else {
        Err(LstmError::DimensionMismatch {
            expected: expected.to_vec(),
            got: got.to_vec(),
            message: format!("{name}的形状不匹配"),
        })
    }
}
