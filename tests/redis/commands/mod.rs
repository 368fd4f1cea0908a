mod xadd;
mod xgroup;
