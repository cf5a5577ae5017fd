/*
 * @Author       : 老董
 * @Date         : 2026-02-10
 * @Description  : 前向传播引擎 - 从左到右遍历时间步，写满门/细胞/隐藏缓存
 */

use super::Lstm;
use crate::errors::LstmError;
use ndarray::linalg::general_mat_mul;
use ndarray::{Array2, Array3, Axis, Zip, s};

impl Lstm {
    /// 前向传播
    ///
    /// # 参数
    /// - `h0`: 初始隐藏状态，形状 [batch, `hidden_size`]
    /// - `c0`: 初始细胞状态，形状 [batch, `hidden_size`]
    /// - `x`: 输入序列，形状 [batch, `seq_len`, `input_size`]
    ///
    /// # 返回
    /// 隐藏状态序列，形状 [batch, `seq_len`, `hidden_size`]。
    /// 副作用：填充门缓存与细胞缓存，供随后的`backward`读取。
    /// 缓存里存的是**激活后**的门值——反向的导数公式直接以激活值表达，
    /// 激活函数只在前向求值一次。
    pub fn forward(
        &mut self,
        h0: &Array2<f64>,
        c0: &Array2<f64>,
        x: &Array3<f64>,
    ) -> Result<Array3<f64>, LstmError> {
        let (batch, seq_len) = self.check_call_shapes(h0, c0, x)?;
        let d = self.input_size;
        let h = self.hidden_size;

        // 新的前向一旦开始，上一代缓存即作废
        self.ready = None;
        self.store.prepare_forward(batch, seq_len, h);
        let st = &mut self.store;

        let mut prev_h = h0.clone();
        let mut prev_c = c0.clone();

        for t in 0..seq_len {
            let x_t = x.index_axis(Axis(1), t);

            // 融合预激活: a_t = b + x_t @ Wx + h_{t-1} @ Wh，随后就地激活
            {
                let wx = st.w.slice(s![..d, ..]);
                let wh = st.w.slice(s![d.., ..]);
                let mut a_t = st.gates.index_axis_mut(Axis(1), t);
                a_t.assign(&st.b.broadcast((batch, 4 * h)).unwrap());
                general_mat_mul(1.0, &x_t, &wx, 1.0, &mut a_t);
                general_mat_mul(1.0, &prev_h, &wh, 1.0, &mut a_t);
                a_t.slice_mut(s![.., ..3 * h]).mapv_inplace(sigmoid);
                a_t.slice_mut(s![.., 3 * h..]).mapv_inplace(f64::tanh);
            }

            let a_t = st.gates.index_axis(Axis(1), t);
            let i_gate = a_t.slice(s![.., ..h]);
            let f_gate = a_t.slice(s![.., h..2 * h]);
            let o_gate = a_t.slice(s![.., 2 * h..3 * h]);
            let g_gate = a_t.slice(s![.., 3 * h..]);

            // c_t = f ⊙ c_{t-1} + i ⊙ g
            {
                let mut c_t = st.cells.index_axis_mut(Axis(1), t);
                Zip::from(&mut c_t)
                    .and(&f_gate)
                    .and(&prev_c)
                    .and(&i_gate)
                    .and(&g_gate)
                    .for_each(|c, &f, &pc, &i, &g| *c = f * pc + i * g);
            }

            // h_t = tanh(c_t) ⊙ o
            let c_t = st.cells.index_axis(Axis(1), t);
            let mut h_t = st.hiddens.index_axis_mut(Axis(1), t);
            Zip::from(&mut h_t)
                .and(&c_t)
                .and(&o_gate)
                .for_each(|hv, &c, &o| *hv = c.tanh() * o);

            prev_h.assign(&h_t);
            prev_c.assign(&c_t);
        }

        self.ready = Some((batch, seq_len));
        Ok(st.hiddens.clone())
    }
}

fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}
