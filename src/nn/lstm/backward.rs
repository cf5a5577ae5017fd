/*
 * @Author       : 老董
 * @Date         : 2026-02-10
 * @Description  : 反向传播引擎（BPTT）- 从右到左遍历时间步，
 *                 基于缓存的激活后门值解析重建各门梯度
 *
 * 每个时间步的推导（σ'(x)=s(1-s)，tanh'(x)=1-tanh²）:
 *   grad_c += (1 - tanh(c_t)²) ⊙ o ⊙ grad_h
 *   grad_o  = o(1-o) ⊙ tanh(c_t) ⊙ grad_h
 *   grad_i  = i(1-i) ⊙ g ⊙ grad_c
 *   grad_f  = f(1-f) ⊙ c_{t-1} ⊙ grad_c
 *   grad_g  = (1-g²) ⊙ i ⊙ grad_c
 * 四个门块按前向的列序拼成grad_a: [N, 4H]，再分别对Wx/Wh/b做
 * 转置GEMM累积参数梯度、对Wxᵀ/Whᵀ传播输入与循环梯度。
 */

use super::Lstm;
use crate::errors::LstmError;
use ndarray::linalg::general_mat_mul;
use ndarray::{Array2, Array3, Axis, Zip, s};

impl Lstm {
    /// 反向传播（BPTT）
    ///
    /// # 参数
    /// - `h0`/`c0`/`x`: 与最近一次`forward`完全相同的输入
    /// - `grad_h`: 上游对隐藏状态序列的梯度，形状 [batch, `seq_len`, `hidden_size`]
    /// - `scale`: 施加在所有参数梯度贡献上的缩放因子（常用1.0；
    ///   取1/batch可实现梯度平均，取0则参数梯度累积器保持不变）
    ///
    /// # 返回
    /// `(grad_h0, grad_c0, grad_x)`——对初始隐藏状态、初始细胞状态与
    /// 输入序列的梯度。参数梯度按`scale`**累加**进累积器（不覆写），
    /// 多个mini-batch可先累积再统一执行优化器步。
    ///
    /// # 错误
    /// - [`LstmError::DimensionMismatch`]: 任一输入形状与层配置不符
    /// - [`LstmError::UnpreparedState`]: 之前没有批次/序列大小匹配的前向调用
    pub fn backward(
        &mut self,
        h0: &Array2<f64>,
        c0: &Array2<f64>,
        x: &Array3<f64>,
        grad_h: &Array3<f64>,
        scale: f64,
    ) -> Result<(Array2<f64>, Array2<f64>, Array3<f64>), LstmError> {
        let (batch, seq_len) = self.check_call_shapes(h0, c0, x)?;
        let d = self.input_size;
        let h = self.hidden_size;
        {
            let (gh_batch, gh_seq, gh_hidden) = grad_h.dim();
            super::check_shape(
                "上游梯度grad_h",
                &[batch, seq_len, h],
                &[gh_batch, gh_seq, gh_hidden],
            )?;
        }
        if self.ready != Some((batch, seq_len)) {
            return Err(LstmError::UnpreparedState);
        }

        self.store.prepare_backward(batch, h);
        let st = &mut self.store;
        let mut grad_x = Array3::<f64>::zeros((batch, seq_len, d));

        for t in (0..seq_len).rev() {
            let a_t = st.gates.index_axis(Axis(1), t);
            let i_gate = a_t.slice(s![.., ..h]);
            let f_gate = a_t.slice(s![.., h..2 * h]);
            let o_gate = a_t.slice(s![.., 2 * h..3 * h]);
            let g_gate = a_t.slice(s![.., 3 * h..]);
            let c_t = st.cells.index_axis(Axis(1), t);
            let prev_c = if t == 0 {
                c0.view()
            } else {
                st.cells.index_axis(Axis(1), t - 1)
            };

            // 1. 累加本步的上游梯度（t+1的循环梯度 + t处的直接上游梯度）
            st.grad_next_h += &grad_h.index_axis(Axis(1), t);

            // 2/3. 经h_t = tanh(c_t)⊙o追加细胞梯度，同时得出输出门梯度；
            //      tanh(c_t)只求值一次，两个公式共用
            {
                let mut grad_o = st.grad_gates.slice_mut(s![.., 2 * h..3 * h]);
                Zip::from(&mut grad_o)
                    .and(&mut st.grad_next_c)
                    .and(&c_t)
                    .and(&o_gate)
                    .and(&st.grad_next_h)
                    .for_each(|go, gc, &c, &o, &gh| {
                        let tanh_c = c.tanh();
                        *gc += (1.0 - tanh_c * tanh_c) * o * gh;
                        *go = o * (1.0 - o) * tanh_c * gh;
                    });
            }

            // 4. 其余门梯度，全部以缓存的激活后值表达
            {
                let mut grad_i = st.grad_gates.slice_mut(s![.., ..h]);
                Zip::from(&mut grad_i)
                    .and(&i_gate)
                    .and(&g_gate)
                    .and(&st.grad_next_c)
                    .for_each(|gi, &i, &g, &gc| *gi = i * (1.0 - i) * g * gc);
            }
            {
                let mut grad_f = st.grad_gates.slice_mut(s![.., h..2 * h]);
                Zip::from(&mut grad_f)
                    .and(&f_gate)
                    .and(&prev_c)
                    .and(&st.grad_next_c)
                    .for_each(|gf, &f, &pc, &gc| *gf = f * (1.0 - f) * pc * gc);
            }
            {
                let mut grad_g = st.grad_gates.slice_mut(s![.., 3 * h..]);
                Zip::from(&mut grad_g)
                    .and(&g_gate)
                    .and(&i_gate)
                    .and(&st.grad_next_c)
                    .for_each(|gg, &g, &i, &gc| *gg = (1.0 - g * g) * i * gc);
            }

            // 5. 传播到输入: grad_x_t = grad_a @ Wxᵀ
            {
                let wx = st.w.slice(s![..d, ..]);
                let wx_t = wx.t();
                let mut grad_x_t = grad_x.index_axis_mut(Axis(1), t);
                general_mat_mul(1.0, &st.grad_gates, &wx_t, 0.0, &mut grad_x_t);
            }

            // 6. 累积参数梯度: grad_Wx += scale·x_tᵀ@grad_a，
            //    grad_Wh += scale·h_{t-1}ᵀ@grad_a，grad_b += scale·Σ_N grad_a
            {
                let x_t = x.index_axis(Axis(1), t);
                let x_t_t = x_t.t();
                let mut grad_wx = st.grad_w.slice_mut(s![..d, ..]);
                general_mat_mul(scale, &x_t_t, &st.grad_gates, 1.0, &mut grad_wx);
            }
            {
                let prev_h = if t == 0 {
                    h0.view()
                } else {
                    st.hiddens.index_axis(Axis(1), t - 1)
                };
                let prev_h_t = prev_h.t();
                let mut grad_wh = st.grad_w.slice_mut(s![d.., ..]);
                general_mat_mul(scale, &prev_h_t, &st.grad_gates, 1.0, &mut grad_wh);
            }
            st.bias_sum.fill(0.0);
            for row in st.grad_gates.rows() {
                st.bias_sum += &row;
            }
            st.grad_b.scaled_add(scale, &st.bias_sum);

            // 7. 为更早的时间步传播循环梯度：grad_next_h整体替换（步骤1会再叠加
            //    上游项）；grad_next_c乘以本步遗忘门——该缩放必须位于步骤4~6之后，
            //    否则缩放所用的遗忘门会错位一个时间步
            {
                let wh = st.w.slice(s![d.., ..]);
                let wh_t = wh.t();
                general_mat_mul(1.0, &st.grad_gates, &wh_t, 0.0, &mut st.grad_next_h);
            }
            st.grad_next_c *= &f_gate;
        }

        // 循环结束后，运行中的状态梯度恰为对h0/c0的梯度
        Ok((st.grad_next_h.clone(), st.grad_next_c.clone(), grad_x))
    }
}
