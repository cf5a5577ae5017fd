/*
 * @Author       : 老董
 * @Date         : 2026-02-10
 * @Description  : 参数与缓冲存储 - 持有权重、偏置、梯度累积器、
 *                 前向缓存以及跨时间步复用的暂存缓冲
 *
 * 缓存按(batch, seq_len)键按需扩容：同一层实例以不同批次/序列大小
 * 反复调用时无须重建。扩容后要么整体清零、要么被调用方整体覆写，
 * 调用方不会观察到部分扩容的中间状态。
 */

use ndarray::{Array1, Array2, Array3};
use rand::distributions::{Distribution, Standard};
use rand::rngs::StdRng;

/// LSTM层的参数与缓冲存储
///
/// 权重矩阵`w`形状为`[input_size + hidden_size, 4 * hidden_size]`：
/// 前`input_size`行是输入子块Wx，其余行是隐藏子块Wh；
/// 列按固定顺序分为四个`hidden_size`宽的门块——输入门i、遗忘门f、
/// 输出门o、候选细胞g。该列序在层的整个生命周期内不变，
/// 前向与反向共享同一布局。
pub(super) struct LstmStore {
    /// 权重矩阵W: [D+H, 4H]，行分块[Wx; Wh]，列分块[i|f|o|g]
    pub(super) w: Array2<f64>,
    /// 偏置b: [4H]，列分块与W一致
    pub(super) b: Array1<f64>,
    /// W的梯度累积器（随backward按缩放因子累加）
    pub(super) grad_w: Array2<f64>,
    /// b的梯度累积器
    pub(super) grad_b: Array1<f64>,

    // === 前向缓存（每次forward整体覆写，供随后的backward读取） ===
    /// 门缓存: [N, T, 4H]，存的是**激活后**的值（i/f/o过sigmoid，g过tanh）
    pub(super) gates: Array3<f64>,
    /// 细胞状态缓存: [N, T, H]
    pub(super) cells: Array3<f64>,
    /// 隐藏状态缓存: [N, T, H]，同时也是forward的返回值来源
    pub(super) hiddens: Array3<f64>,

    // === 暂存缓冲（逆序迭代中跨时间步复用，内容不跨步存活） ===
    /// 沿时间回传的隐藏状态梯度: [N, H]
    pub(super) grad_next_h: Array2<f64>,
    /// 沿时间回传的细胞状态梯度: [N, H]
    pub(super) grad_next_c: Array2<f64>,
    /// 当前时间步的门预激活梯度: [N, 4H]
    pub(super) grad_gates: Array2<f64>,
    /// 偏置梯度的列求和暂存: [4H]
    pub(super) bias_sum: Array1<f64>,
}

impl LstmStore {
    pub(super) fn new(input_size: usize, hidden_size: usize, rng: &mut StdRng) -> Self {
        let rows = input_size + hidden_size;
        let cols = 4 * hidden_size;
        let std_dev = Self::default_std(input_size, hidden_size);
        Self {
            w: Self::new_normal((rows, cols), std_dev, rng),
            b: Array1::zeros(cols),
            grad_w: Array2::zeros((rows, cols)),
            grad_b: Array1::zeros(cols),
            gates: Array3::zeros((0, 0, 0)),
            cells: Array3::zeros((0, 0, 0)),
            hiddens: Array3::zeros((0, 0, 0)),
            grad_next_h: Array2::zeros((0, 0)),
            grad_next_c: Array2::zeros((0, 0)),
            grad_gates: Array2::zeros((0, 0)),
            bias_sum: Array1::zeros(cols),
        }
    }

    /// 默认初始化标准差：1/√(D+H)
    pub(super) fn default_std(input_size: usize, hidden_size: usize) -> f64 {
        1.0 / ((input_size + hidden_size) as f64).sqrt()
    }

    /// 重新初始化参数：W服从N(0, std_dev²)，b清零
    pub(super) fn reset_parameters(
        &mut self,
        input_size: usize,
        hidden_size: usize,
        std_dev: f64,
        rng: &mut StdRng,
    ) {
        let rows = input_size + hidden_size;
        let cols = 4 * hidden_size;
        self.w = Self::new_normal((rows, cols), std_dev, rng);
        self.b.fill(0.0);
    }

    /// 清零梯度累积器（调用方开启新的累积窗口时使用）
    pub(super) fn zero_grad(&mut self) {
        self.grad_w.fill(0.0);
        self.grad_b.fill(0.0);
    }

    /// 为一次前向调用准备缓存：形状变化时重建，否则留给前向整体覆写
    pub(super) fn prepare_forward(&mut self, batch: usize, seq_len: usize, hidden: usize) {
        if self.gates.dim() != (batch, seq_len, 4 * hidden) {
            self.gates = Array3::zeros((batch, seq_len, 4 * hidden));
            self.cells = Array3::zeros((batch, seq_len, hidden));
            self.hiddens = Array3::zeros((batch, seq_len, hidden));
        }
    }

    /// 为一次反向调用准备暂存缓冲：形状不变则就地清零
    pub(super) fn prepare_backward(&mut self, batch: usize, hidden: usize) {
        if self.grad_next_h.dim() != (batch, hidden) {
            self.grad_next_h = Array2::zeros((batch, hidden));
            self.grad_next_c = Array2::zeros((batch, hidden));
            self.grad_gates = Array2::zeros((batch, 4 * hidden));
        } else {
            self.grad_next_h.fill(0.0);
            self.grad_next_c.fill(0.0);
            // grad_gates每个时间步都会被四个门块整体覆写，无须清零
        }
    }

    /// 生成服从正态分布的权重矩阵（Box-Muller变换）
    fn new_normal(shape: (usize, usize), std_dev: f64, rng: &mut StdRng) -> Array2<f64> {
        let data_len = shape.0 * shape.1;
        let mut data = Vec::with_capacity(data_len);

        while data.len() < data_len {
            let u1: f64 = Standard.sample(rng);
            let u2: f64 = Standard.sample(rng);
            let r = (-2.0 * u1.ln()).sqrt();
            let theta = 2.0 * std::f64::consts::PI * u2;
            let z0 = std_dev * r * theta.cos();
            let z1 = std_dev * r * theta.sin();

            if z0.is_finite() {
                data.push(z0);
            }
            if data.len() < data_len && z1.is_finite() {
                data.push(z1);
            }
        }

        Array2::from_shape_vec(shape, data).unwrap()
    }
}
