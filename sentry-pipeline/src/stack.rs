use std::sync::Arc;

use crate::{Client, Scope};

#[derive(Debug, Clone)]
pub struct StackLayer {
    pub client: Option<Arc<Client>>,
    pub scope: Scope,
}

#[derive(Debug)]
pub struct Stack {
    top: StackLayer,
    layers: Vec<StackLayer>,
}

impl Stack {
    pub fn from_client_and_scope(client: Option<Arc<Client>>, scope: Scope) -> Stack {
        Stack {
            top: StackLayer { client, scope },
            layers: vec![],
        }
    }

    pub fn push(&mut self) {
        let layer = self.top.clone();
        self.layers.push(layer);
    }

    /// Restores the layer below the top.  The bottom layer is never popped.
    pub fn pop(&mut self) -> bool {
        match self.layers.pop() {
            Some(layer) => {
                self.top = layer;
                true
            }
            None => false,
        }
    }

    #[inline(always)]
    pub fn top(&self) -> &StackLayer {
        &self.top
    }

    #[inline(always)]
    pub fn top_mut(&mut self) -> &mut StackLayer {
        &mut self.top
    }

    pub fn depth(&self) -> usize {
        self.layers.len()
    }
}
