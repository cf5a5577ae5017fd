//! # Only LSTM
//!
//! `only_lstm`项目是[only_torch](https://github.com/dbsxdbsx/only_torch)的姊妹实验：
//! 不构建自动微分图，而是用手工推导的微积分公式实现批量LSTM递推的
//! 前向传播与反向传播（BPTT），作为可训练序列模型的计算核心。
//!

pub mod errors;
pub mod nn;
