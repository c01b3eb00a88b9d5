pub mod ai;
pub mod inpaint;
pub mod paint;
